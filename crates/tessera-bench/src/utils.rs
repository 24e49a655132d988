//! Benchmark utilities and helpers.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera_common::types::{Entity, Value, ValueType};
use tessera_core::memory::MemoryTable;
use tessera_core::variable::Variable;

/// Entity type of every generated table.
pub const ENTITY_TYPE: &str = "Participant";

/// Generates random string data for benchmarks.
pub fn random_string(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generates sequential identifiers, `prefix` followed by a padded index.
pub fn generate_identifiers(count: usize, prefix: &str) -> Vec<String> {
    (0..count).map(|i| format!("{}{:08}", prefix, i)).collect()
}

/// Returns the entities of a list of identifiers.
pub fn entities(identifiers: &[String]) -> Vec<Entity> {
    identifiers
        .iter()
        .map(|id| Entity::new(ENTITY_TYPE, id.as_str()))
        .collect()
}

/// Generates a participant table with `AGE`, `SCORE` and `CODE` columns
/// whose variable names carry `prefix`.
pub fn generate_table(name: &str, prefix: &str, identifiers: &[String]) -> Arc<MemoryTable> {
    let age = format!("{}AGE", prefix);
    let score = format!("{}SCORE", prefix);
    let code = format!("{}CODE", prefix);
    let table = MemoryTable::builder(name, ENTITY_TYPE)
        .datasource("bench")
        .variable(Variable::new(age.as_str(), ValueType::Integer, ENTITY_TYPE))
        .variable(Variable::new(score.as_str(), ValueType::Decimal, ENTITY_TYPE))
        .variable(Variable::new(code.as_str(), ValueType::Text, ENTITY_TYPE))
        .build();

    let mut rng = StdRng::seed_from_u64(42);
    for id in identifiers {
        let values = [
            (age.as_str(), Value::integer(rng.gen_range(18..90))),
            (score.as_str(), Value::decimal(rng.gen_range(0.0..100.0))),
            (code.as_str(), Value::text(random_string(&mut rng, 8))),
        ];
        table.insert(id, values).expect("generated row");
    }
    Arc::new(table)
}
