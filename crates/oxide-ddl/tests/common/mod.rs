#![allow(dead_code)]

use oxide_ddl::prelude::*;
use serde_json::{json, Value};

/// Editor document with a single `users` table, including the
/// presentation keys the editor stores next to the model.
pub fn users_document() -> Value {
    json!({
        "title": "Untitled diagram",
        "tables": [{
            "id": 0,
            "name": "users",
            "x": 120,
            "y": 80,
            "color": "#175e7a",
            "fields": [
                { "id": 0, "name": "id", "type": "INT", "primary": true, "notNull": true, "increment": true },
                { "id": 1, "name": "name", "type": "VARCHAR" }
            ],
            "indices": []
        }],
        "relationships": []
    })
}

pub fn users() -> Schema {
    Schema::from_value(users_document()).unwrap_or_else(|e| panic!("Invalid fixture: {e}"))
}

/// `orders.customer_id -> customers.id`, ON DELETE CASCADE. The
/// referencing table is declared first unless `customers_first` is set.
pub fn shop(customers_first: bool) -> Schema {
    let orders = Table::new(1, "orders")
        .field(Field::new(0, "id", "INT").primary().increment())
        .field(Field::new(1, "customer_id", "INT").not_null());
    let customers = Table::new(2, "customers")
        .field(Field::new(0, "id", "INT").primary().increment())
        .field(Field::new(1, "name", "VARCHAR").size("100").not_null());

    let schema = if customers_first {
        Schema::new().table(customers).table(orders)
    } else {
        Schema::new().table(orders).table(customers)
    };
    schema.relationship(
        Relationship::new(0, "fk_orders_customer", (1, 1), (2, 0))
            .on_delete(ConstraintAction::Cascade),
    )
}

/// `users` with an extra constrained `email` column.
pub fn users_with_email() -> Schema {
    let mut schema = users();
    schema.tables[0]
        .fields
        .push(Field::new(2, "email", "VARCHAR").size("100").not_null().unique());
    schema
}

pub fn statements(schema: &Schema, dialect: Dialect) -> Vec<String> {
    emit_script(schema, dialect)
        .unwrap_or_else(|e| panic!("Failed to emit for {dialect}: {e}"))
        .statements()
        .to_vec()
}

pub fn migration(from: &Schema, to: &Schema, dialect: Dialect) -> Migration {
    migrate(from, to, dialect, &IgnoreKeys::presentation())
        .unwrap_or_else(|e| panic!("Failed to synthesize for {dialect}: {e}"))
}

pub fn position(statements: &[String], needle: &str) -> usize {
    statements
        .iter()
        .position(|s| s.contains(needle))
        .unwrap_or_else(|| panic!("No statement contains {needle:?} in {statements:#?}"))
}
