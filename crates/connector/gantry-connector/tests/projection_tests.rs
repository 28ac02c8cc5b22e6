//! Property tests for the well-known projections

use gantry_connector::entity::{
    EntityValue, Representation, ScalarType, Shape, TableData, TypeProjectionRegistry, Value, INDEX_COLUMN,
    VALUE_COLUMN,
};
use gantry_connector::ConnectorError;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_integer_text_round_trip(n in any::<i64>()) {
        let registry = TypeProjectionRegistry::new("prop");
        let text = EntityValue::of(n, registry.scalar(ScalarType::Integer))
            .convert(Representation::Text)
            .unwrap()
            .unwrap()
            .into_owned();
        let back = EntityValue::new(Some(text), registry.scalar(ScalarType::Text))
            .convert(Representation::Integer)
            .unwrap()
            .unwrap()
            .into_owned();
        prop_assert_eq!(back, Value::Integer(n));
    }

    #[test]
    fn test_array_table_preserves_order(items in proptest::collection::vec(any::<i64>(), 0..32)) {
        let registry = TypeProjectionRegistry::new("prop");
        let ty = registry.array_of(ScalarType::Integer);
        let array = Value::Array(items.iter().copied().map(Value::Integer).collect());

        let table = ty.convert(&array, Representation::Table).unwrap().into_owned();
        let back = ty.convert(&table, Representation::Array).unwrap().into_owned();
        prop_assert_eq!(back, array);
    }

    #[test]
    fn test_native_representation_is_borrowed(flag in any::<bool>()) {
        let registry = TypeProjectionRegistry::new("prop");
        let value = Value::Bool(flag);
        let converted = registry.scalar(ScalarType::Bool).convert(&value, Representation::Bool).unwrap();
        prop_assert!(matches!(converted, std::borrow::Cow::Borrowed(_)));
    }
}

#[test]
fn test_array_is_structural() {
    let registry = TypeProjectionRegistry::new("jdbc");
    assert!(Shape::array_of(ScalarType::Text).is_array());
    assert!(registry.array_of(ScalarType::Float).is_array());

    let mut table = TableData::new([INDEX_COLUMN, VALUE_COLUMN, "extra"]);
    assert!(table.push_row(vec![Value::Integer(0), Value::Integer(1), Value::Integer(2)]));
    assert!(!registry.detect_value(&Value::Table(table)).is_array());
}

#[test]
fn test_short_table_row_is_rejected() {
    let registry = TypeProjectionRegistry::new("jdbc");
    let ty = registry.array_of(ScalarType::Integer);
    let table = TableData {
        columns: vec![INDEX_COLUMN.to_string(), VALUE_COLUMN.to_string()],
        rows: vec![vec![Value::Integer(0)]],
    };

    let err = ty.convert(&Value::Table(table), Representation::Array).unwrap_err();
    assert!(matches!(err, ConnectorError::InvalidValue(_)));

    let empty_row = TableData {
        columns: vec![INDEX_COLUMN.to_string(), VALUE_COLUMN.to_string()],
        rows: vec![Vec::new()],
    };
    assert!(ty.convert(&Value::Table(empty_row), Representation::Array).is_err());
}
