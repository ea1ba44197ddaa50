//! Read, write and read again.

mod common;

use common::{ifc_schema, step_file};
use ifcstep::{parse_model, write_step_to_string, Model, ReadOptions, Value, WriteOptions};
use pretty_assertions::assert_eq;

const RECORDS: &[&str] = &[
    "#1= IFCOWNERHISTORY('ADDED',1700000000);",
    "#2= IFCCARTESIANPOINT((0.,0.,0.));",
    "#3= IFCCARTESIANPOINT((2.5,-1.25,2.5E-10));",
    "#4= IFCPOLYLINE((#2,#3));",
    "#5= IFCWALL('2O2Fr$t4X7Zf8NOew3FLOH',#1,'O''Neil \\X2\\00E9\\X0\\',$,'Partition',#4,#4,.U.);",
    "#6= IFCSIUNIT(*,.LENGTHUNIT.,.METRE.);",
    "#7= IFCMONETARYUNIT('EUR');",
    "#8= IFCUNITASSIGNMENT((#6,#7));",
    "#9= IFCPROPERTYSINGLEVALUE('Width',$,IFCLENGTHMEASURE(0.2),#6);",
    "#10= IFCPROPERTYSINGLEVALUE('LoadBearing',$,IFCBOOLEAN(.T.),$);",
    "#11= IFCCARTESIANPOINTLIST3D(((0.,0.,0.),(1.,0.,0.),(1.,1.,0.5)));",
];

fn data_section(text: &str) -> &str {
    let start = text.find("DATA;\n").unwrap() + "DATA;\n".len();
    let end = text.rfind("ENDSEC;").unwrap();
    &text[start..end]
}

fn load(text: &str) -> Model {
    let loaded = parse_model(text, ifc_schema(), &ReadOptions::default()).unwrap();
    assert!(loaded.diagnostics.is_empty(), "{:?}", loaded.diagnostics);
    loaded.model
}

#[test]
fn written_text_matches_canonical_input() {
    let model = load(&step_file(RECORDS));
    let out = write_step_to_string(&model, &WriteOptions::default());
    let expected: String = RECORDS.iter().map(|r| format!("{}\n", r)).collect();
    assert_eq!(data_section(&out), expected);
    // header records are carried over as read
    assert!(out.contains("FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');"));
}

#[test]
fn reparse_yields_equal_attributes() {
    let first = load(&step_file(RECORDS));
    let second = load(&write_step_to_string(&first, &WriteOptions::default()));
    assert_eq!(first.len(), second.len());
    for view in first.entities() {
        let other = second.view_by_id(view.id()).unwrap();
        assert_eq!(view.type_name(), other.type_name());
        assert_eq!(view.entity().attributes(), other.entity().attributes());
    }
}

#[test]
fn decoded_values_carry_types() {
    let model = load(&step_file(RECORDS));
    let wall = model.view_by_id(5).unwrap();
    assert_eq!(wall.get("Name").unwrap().as_str(), Some("O'Neil é"));
    assert_eq!(
        wall.get("IsExternal"),
        Some(&Value::Logical(ifcstep::Logical::Unknown))
    );

    let width = model.view_by_id(9).unwrap();
    match width.get("NominalValue").unwrap() {
        Value::Typed { type_name, value } => {
            assert_eq!(type_name, "IFCLENGTHMEASURE");
            assert_eq!(value.as_real(), Some(0.2));
        }
        other => panic!("expected a typed value, got {:?}", other),
    }

    let list = model.view_by_id(11).unwrap();
    match list.get("CoordList").unwrap() {
        Value::NestedList(rows) => {
            assert_eq!(rows.len(), 3);
            assert_eq!(rows[2][2].as_real(), Some(0.5));
        }
        other => panic!("expected a nested list, got {:?}", other),
    }
}

#[test]
fn forward_reference_order_does_not_matter() {
    let mut reversed: Vec<&str> = RECORDS.to_vec();
    reversed.reverse();
    let forward = load(&step_file(RECORDS));
    let backward = load(&step_file(&reversed));

    for view in forward.entities() {
        let other = backward.view_by_id(view.id()).unwrap();
        assert_eq!(view.to_step(), other.to_step());
        let targets: Vec<_> = view.targets("Points").iter().map(|t| t.id()).collect();
        let other_targets: Vec<_> = other.targets("Points").iter().map(|t| t.id()).collect();
        assert_eq!(targets, other_targets);
    }

    let sorted = write_step_to_string(
        &backward,
        &WriteOptions {
            sort_by_id: true,
            ..Default::default()
        },
    );
    let unsorted = write_step_to_string(&forward, &WriteOptions::default());
    assert_eq!(data_section(&sorted), data_section(&unsorted));
}

#[test]
fn whitespace_and_case_are_normalized() {
    let model = load(&step_file(&[
        "#1 = IfcCartesianPoint ( ( 1. , 2. ) ) ;",
        "#2=ifcpolyline((#1,#1));",
        "/* a comment */ #3=IFCSIUNIT(*,.lengthunit.,.metre.);",
    ]));
    let out = write_step_to_string(&model, &WriteOptions::default());
    assert_eq!(
        data_section(&out),
        "#1= IFCCARTESIANPOINT((1.,2.));\n#2= IFCPOLYLINE((#1,#1));\n#3= IFCSIUNIT(*,.LENGTHUNIT.,.METRE.);\n"
    );
}
