//! Loading a schema file the way callers do: TOML on disk, compiled once.

use ifcstep_schema::{AttrType, NamedType, SchemaDef, SchemaError};

const SCHEMA: &str = r#"
name = "IFC4_SUBSET"

[[defined]]
name = "IfcLabel"
type = "STRING"

[[defined]]
name = "IfcLengthMeasure"
type = "REAL"

[[defined]]
name = "IfcPositiveLengthMeasure"
type = "IfcLengthMeasure"

[[enumeration]]
name = "IfcUnitEnum"
values = ["LENGTHUNIT", "AREAUNIT"]

[[select]]
name = "IfcUnit"
members = ["IfcNamedUnit", "IfcMonetaryUnit"]

[[entity]]
name = "IfcNamedUnit"
abstract = true
attributes = [
    { name = "Dimensions", type = "IfcLabel", optional = true },
    { name = "UnitType", type = "IfcUnitEnum" },
]

[[entity]]
name = "IfcSIUnit"
supertype = "IfcNamedUnit"
derived = ["Dimensions"]
attributes = [
    { name = "Name", type = "IfcLabel" },
]
inverses = [
    { name = "InAssignments", entity = "IfcUnitAssignment", attribute = "Units" },
]

[[entity]]
name = "IfcMonetaryUnit"
attributes = [{ name = "Currency", type = "IfcLabel" }]

[[entity]]
name = "IfcUnitAssignment"
attributes = [{ name = "Units", type = "SET [1:?] OF IfcUnit" }]
"#;

#[test]
fn compiles_subset() {
    let schema = SchemaDef::from_toml(SCHEMA).unwrap().compile().unwrap();
    assert_eq!(schema.name(), "IFC4_SUBSET");

    let si = schema.entity_type("IfcSIUnit").unwrap();
    assert_eq!(si.keyword, "IFCSIUNIT");
    assert_eq!(si.arity(), 3);
    assert!(si.slots[0].derived);
    assert!(!si.slots[1].derived);

    let assignment = schema.entity_type("IfcUnitAssignment").unwrap();
    assert_eq!(si.inverses[0].source, assignment.id);
    assert_eq!(si.inverses[0].source_slot, 0);

    let positive = match schema.lookup("IfcPositiveLengthMeasure") {
        Some(NamedType::Defined(id)) => id,
        other => panic!("unexpected {:?}", other),
    };
    let ty = AttrType::Defined(positive);
    assert_eq!(schema.underlying(&ty), &AttrType::Real);

    let monetary = schema.entity_type("IfcMonetaryUnit").unwrap().id;
    assert!(schema.accepts_entity(&assignment.slots[0].ty, monetary));
    assert!(schema.accepts_entity(&assignment.slots[0].ty, si.id));
}

#[test]
fn rejects_inverse_on_wrong_target() {
    let broken = SCHEMA.replace(
        "name = \"IfcMonetaryUnit\"\nattributes",
        "name = \"IfcMonetaryUnit\"\ninverses = [{ name = \"Bad\", entity = \"IfcSIUnit\", attribute = \"Name\" }]\nattributes",
    );
    let err = SchemaDef::from_toml(&broken).unwrap().compile().unwrap_err();
    assert!(matches!(err, SchemaError::InvalidInverse { .. }), "{err}");
}
