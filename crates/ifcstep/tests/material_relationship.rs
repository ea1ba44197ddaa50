//! A relationship entity declared after its targets links back to both.

mod common;

use common::{ifc_schema, step_file};
use ifcstep::{parse_model, Describe, ReadOptions};

#[test]
fn material_relationship_links_both_targets() {
    let text = step_file(&[
        "#1=IFCMONETARYUNIT('EUR');",
        "#2=IFCBOUNDARYCONDITION($);",
        "#3=IFCMATERIALRELATIONSHIP($,$,#1,(#2),$);",
    ]);
    let loaded = parse_model(&text, ifc_schema(), &ReadOptions::default()).unwrap();
    assert!(loaded.diagnostics.is_empty(), "{:?}", loaded.diagnostics);
    let model = &loaded.model;

    let unit = model.view_by_id(1).unwrap();
    let relating: Vec<_> = unit.inverse("RelatingTo").iter().map(|v| v.id()).collect();
    assert_eq!(relating, vec![3]);

    let condition = model.view_by_id(2).unwrap();
    let related: Vec<_> = condition.inverse("RelatedTo").iter().map(|v| v.id()).collect();
    assert_eq!(related, vec![3]);
    assert_eq!(condition.describe_inverse(), vec![("RelatedTo", vec![3])]);

    let relationship = model.view_by_id(3).unwrap();
    assert_eq!(
        relationship.to_step(),
        "#3= IFCMATERIALRELATIONSHIP($,$,#1,(#2),$);"
    );
    assert_eq!(relationship.targets("RelatedMaterials")[0].id(), 2);
    let names: Vec<_> = relationship.describe().iter().map(|(n, _)| *n).collect();
    assert_eq!(
        names,
        vec![
            "Name",
            "Description",
            "RelatingMaterial",
            "RelatedMaterials",
            "Expression"
        ]
    );
}

#[test]
fn independent_records_parse_on_their_own() {
    let text = step_file(&["#1=IFCMONETARYUNIT('EUR');", "#2=IFCBOUNDARYCONDITION($);"]);
    let loaded = parse_model(&text, ifc_schema(), &ReadOptions::default()).unwrap();
    assert!(loaded.diagnostics.is_empty());
    assert_eq!(loaded.model.len(), 2);
    assert!(loaded.model.view_by_id(1).unwrap().inverse("RelatingTo").is_empty());
    assert_eq!(
        loaded.model.view_by_id(1).unwrap().get("Currency").unwrap().as_str(),
        Some("EUR")
    );
}
