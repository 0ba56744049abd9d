//! Implementation of the `claimdesk add` command.

use crate::cli::{AddArgs, GlobalArgs};
use crate::commands::Desk;
use crate::error::Result;
use crate::resource::{ResourceKey, ResourceRecord};

pub fn cmd_add(global: &GlobalArgs, args: AddArgs) -> Result<()> {
    let desk = Desk::open(global)?;
    let operator = desk.operator(global)?;

    let key = ResourceKey::new(args.resource_type, &args.resource_id)?;
    let mut record = ResourceRecord::new(key.clone(), args.status);
    for (name, value) in args.fields {
        record.extra.insert(name, field_value(&value));
    }

    desk.coordinator.add_resource(record, &operator)?;

    println!("Added {} ({})", key, args.status);
    Ok(())
}

/// Interpret a field value as a YAML scalar, so `amount=250` stores a
/// number. Anything that does not parse is kept as a string.
fn field_value(raw: &str) -> serde_yaml::Value {
    match serde_yaml::from_str::<serde_yaml::Value>(raw) {
        Ok(value @ (serde_yaml::Value::Bool(_) | serde_yaml::Value::Number(_))) => value,
        _ => serde_yaml::Value::String(raw.to_string()),
    }
}
