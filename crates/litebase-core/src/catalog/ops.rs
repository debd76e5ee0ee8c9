//! Catalog operations: building a schema from its definition and reconciling
//! it with the descriptor cached for the same table name.
//!
//! Reconciliation is what keeps stored rows valid across schema changes. Each
//! field keeps the identity it was first given for as long as it stays in the
//! schema; new fields get fresh identities, and fields that disappear have
//! their column purged from every stored row.

use tracing::debug;
use xxhash_rust::xxh64::xxh64;

use crate::types::{FieldId, TableData};

use super::{Field, Schema, SchemaDefinition, TableDescriptor};

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Next field identity to hand out.
    pub last_field_id: FieldId,
    /// Checksum of the reconciled schema.
    pub checksum: u64,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Build a live schema from a caller definition. Identities are left at zero
/// until [`reconcile`] assigns them.
pub fn build_schema(def: &SchemaDefinition) -> Schema {
    def.iter()
        .map(|(name, field)| (name.clone(), Field::from_def(field)))
        .collect()
}

/// Map `schema` onto the identities and counters of `cached`.
///
/// Carried-over fields take their cached identity, and their cached counter
/// when the cached field auto-increments. New fields take consecutive
/// identities starting at the cached `last_field_id`. Fields only present in
/// `cached` are removed from every row in `data`.
pub fn reconcile(
    table: &str,
    schema: &mut Schema,
    cached: Option<&TableDescriptor>,
    data: Option<&mut TableData>,
) -> Reconciled {
    let mut last_field_id = cached.map(|d| d.last_field_id).unwrap_or(0);
    let cached_schema = cached.map(|d| &d.schema);

    let mut added = Vec::new();
    for (name, field) in schema.iter_mut() {
        match cached_schema.and_then(|s| s.get(name)) {
            Some(old) => {
                field.id = old.id;
                last_field_id = last_field_id.max(old.id + 1);
                if old.auto_increment {
                    field.next_value = Some(old.next_value.unwrap_or(1));
                }
            }
            None => added.push(name.clone()),
        }
    }

    for name in &added {
        if let Some(field) = schema.get_mut(name) {
            field.id = last_field_id;
            last_field_id += 1;
            if field.auto_increment {
                field.next_value = Some(1);
            }
        }
    }

    let removed: Vec<(String, FieldId)> = cached_schema
        .map(|s| {
            s.iter()
                .filter(|(name, _)| !schema.contains_key(*name))
                .map(|(name, field)| (name.clone(), field.id))
                .collect()
        })
        .unwrap_or_default();

    if let Some(data) = data {
        for (_, id) in &removed {
            for row in data.values_mut() {
                row.remove(id);
            }
        }
    }

    let checksum = schema_checksum(schema);
    let removed: Vec<String> = removed.into_iter().map(|(name, _)| name).collect();

    debug!(
        table,
        last_field_id,
        checksum,
        added = ?added,
        removed = ?removed,
        "reconciled schema"
    );

    Reconciled {
        last_field_id,
        checksum,
        added,
        removed,
    }
}

/// xxh64 of the schema's canonical JSON form.
pub fn schema_checksum(schema: &Schema) -> u64 {
    serde_json::to_vec(schema)
        .map(|bytes| xxh64(&bytes, 0))
        .unwrap_or_default()
}

/// The first field that is a primary, auto-incrementing `index`.
pub fn primary_index_field(schema: &Schema) -> Option<(&String, &Field)> {
    schema.iter().find(|(_, field)| field.is_primary_index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDef;
    use crate::types::{FieldType, Row, Value};

    fn definition(fields: &[(&str, FieldDef)]) -> SchemaDefinition {
        fields
            .iter()
            .map(|(name, def)| (name.to_string(), def.clone()))
            .collect()
    }

    fn people() -> SchemaDefinition {
        definition(&[
            ("index", FieldDef::primary_index()),
            ("name", FieldDef::new(FieldType::String)),
            ("isAlive", FieldDef::new(FieldType::Boolean).default_value(true)),
        ])
    }

    fn descriptor(schema: Schema, r: &Reconciled) -> TableDescriptor {
        TableDescriptor {
            last_field_id: r.last_field_id,
            checksum: r.checksum,
            schema,
            next_row: 0,
        }
    }

    #[test]
    fn test_fresh_schema_gets_sequential_ids() {
        let mut schema = build_schema(&people());
        let r = reconcile("t", &mut schema, None, None);

        assert_eq!(schema["index"].id, 0);
        assert_eq!(schema["name"].id, 1);
        assert_eq!(schema["isAlive"].id, 2);
        assert_eq!(r.last_field_id, 3);
        assert_eq!(r.added.len(), 3);
        assert!(r.removed.is_empty());
    }

    #[test]
    fn test_unchanged_schema_is_stable() {
        let mut first = build_schema(&people());
        let r1 = reconcile("t", &mut first, None, None);
        first["index"].next_value = Some(7);
        let cached = descriptor(first.clone(), &r1);

        let mut second = build_schema(&people());
        let r2 = reconcile("t", &mut second, Some(&cached), None);

        assert_eq!(second, first);
        assert_eq!(r2.last_field_id, r1.last_field_id);
        assert_eq!(r2.checksum, schema_checksum(&first));
        assert!(r2.added.is_empty());
    }

    #[test]
    fn test_new_field_never_reuses_an_identity() {
        let mut first = build_schema(&people());
        let r1 = reconcile("t", &mut first, None, None);
        let cached = descriptor(first, &r1);

        let mut def = people();
        def.insert("age".to_string(), FieldDef::new(FieldType::Int));
        let mut second = build_schema(&def);
        let r2 = reconcile("t", &mut second, Some(&cached), None);

        assert_eq!(second["age"].id, 3);
        assert_eq!(r2.last_field_id, 4);
        assert_eq!(r2.added, vec!["age".to_string()]);
    }

    #[test]
    fn test_reordered_schema_keeps_identities() {
        let mut first = build_schema(&people());
        let r1 = reconcile("t", &mut first, None, None);
        let cached = descriptor(first, &r1);

        let mut def = people();
        def.reverse();
        def.insert("extra".to_string(), FieldDef::new(FieldType::String));
        let mut second = build_schema(&def);
        reconcile("t", &mut second, Some(&cached), None);

        assert_eq!(second["index"].id, 0);
        assert_eq!(second["name"].id, 1);
        assert_eq!(second["isAlive"].id, 2);
        assert_eq!(second["extra"].id, 3);
    }

    #[test]
    fn test_removed_field_is_purged_from_rows() {
        let mut first = build_schema(&people());
        let r1 = reconcile("t", &mut first, None, None);
        let cached = descriptor(first, &r1);

        let mut data = TableData::new();
        let row: Row = [
            (0, Value::Int(1)),
            (1, Value::from("Matheus")),
            (2, Value::Bool(true)),
        ]
        .into_iter()
        .collect();
        data.insert(1, row);

        let mut def = people();
        def.shift_remove("isAlive");
        let mut second = build_schema(&def);
        let r2 = reconcile("t", &mut second, Some(&cached), Some(&mut data));

        assert_eq!(r2.removed, vec!["isAlive".to_string()]);
        assert_eq!(data[&1].len(), 2);
        assert!(!data[&1].contains_key(&2));
        assert_eq!(data[&1][&1], Value::from("Matheus"));
        // The removed identity is not handed out again.
        assert_eq!(r2.last_field_id, 3);
    }

    #[test]
    fn test_cached_counter_defaults_to_one() {
        let mut first = build_schema(&people());
        let r1 = reconcile("t", &mut first, None, None);
        first["index"].next_value = None;
        let cached = descriptor(first, &r1);

        let mut second = build_schema(&people());
        second["index"].next_value = Some(99);
        reconcile("t", &mut second, Some(&cached), None);

        assert_eq!(second["index"].next_value, Some(1));
    }

    #[test]
    fn test_checksum_changes_with_schema() {
        let mut a = build_schema(&people());
        reconcile("t", &mut a, None, None);
        let mut def = people();
        def.shift_remove("name");
        let mut b = build_schema(&def);
        reconcile("t", &mut b, None, None);

        assert_ne!(schema_checksum(&a), schema_checksum(&b));
    }

    #[test]
    fn test_primary_index_field() {
        let schema = build_schema(&people());
        assert_eq!(primary_index_field(&schema).map(|(n, _)| n.as_str()), Some("index"));

        let plain = build_schema(&definition(&[("name", FieldDef::new(FieldType::String))]));
        assert!(primary_index_field(&plain).is_none());
    }
}
