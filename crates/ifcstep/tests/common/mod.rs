//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use ifcstep::schema::{Schema, SchemaDef};

pub fn ifc_schema() -> Arc<Schema> {
    let def = SchemaDef::from_toml(include_str!("../fixtures/ifc_subset.toml")).unwrap();
    Arc::new(def.compile().unwrap())
}

/// Wrap DATA records in a minimal file.
pub fn step_file(records: &[&str]) -> String {
    let mut out = String::from(
        "ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n",
    );
    for record in records {
        out.push_str(record);
        out.push('\n');
    }
    out.push_str("ENDSEC;\nEND-ISO-10303-21;\n");
    out
}
