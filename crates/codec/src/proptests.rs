// SPDX-License-Identifier: MIT

//! The round-trip law from §8 ("for any value `v` the codec accepts,
//! `read(write(v)) == v`"), checked against generated values rather than
//! a fixed table.

use crate::reader::read;
use crate::writer::write;
use indexmap::IndexMap;
use proptest::prelude::*;
use stevedore_core::Value;

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        (-1e9f64..1e9f64).prop_map(Value::Number),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::Str),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
            prop::collection::vec(("[a-zA-Z][a-zA-Z0-9]{0,8}", inner), 0..6).prop_map(|pairs| {
                let mut map = IndexMap::new();
                for (k, v) in pairs {
                    map.insert(k, v);
                }
                Value::Map(map)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn read_write_round_trips(value in value_strategy()) {
        let text = write(&value);
        prop_assert_eq!(read(&text).unwrap(), value);
    }
}
