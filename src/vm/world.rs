//! Process-wide world state shared by every branch: scoreboards, entities,
//! and blocks.
//!
//! Grounded on the module-level `scoreboards`/`entities`/`blocks` globals in
//! `vm.py`.

use std::collections::BTreeMap;

pub const SERVER: &str = "SERVER";

/// An NBT-like value tree, used both for entity NBT and for parsed selector
/// NBT filters (§4.4 "NBT filter").
#[derive(Clone, Debug, PartialEq)]
pub enum Nbt {
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<Nbt>),
    Compound(BTreeMap<String, Nbt>),
}

#[derive(Clone, Debug, Default)]
pub struct Entity {
    pub id: String,
    pub kind: String,
    pub position: (f64, f64, f64),
    pub tags: Vec<String>,
    pub custom_name: Option<String>,
    pub nbt: Option<Nbt>,
}

/// `objective -> (target -> score)`.
pub type Scoreboards = BTreeMap<String, BTreeMap<String, i64>>;

#[derive(Default)]
pub struct World {
    pub scoreboards: Scoreboards,
    pub entities: Vec<Entity>,
    pub blocks: BTreeMap<(i64, i64, i64), String>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a score, auto-initializing the `(objective, target)` pair to 0 if
    /// absent (spec.md §7 "Runtime recoverable").
    pub fn get_score(&mut self, objective: &str, target: &str) -> i64 {
        *self
            .scoreboards
            .entry(objective.to_string())
            .or_default()
            .entry(target.to_string())
            .or_insert(0)
    }

    pub fn set_score(&mut self, objective: &str, target: &str, value: i64) {
        self.scoreboards
            .entry(objective.to_string())
            .or_default()
            .insert(target.to_string(), value);
    }

    pub fn reset_score(&mut self, target: &str, objective: Option<&str>) {
        match objective {
            Some(obj) => {
                if let Some(scores) = self.scoreboards.get_mut(obj) {
                    scores.remove(target);
                }
            }
            None => {
                for scores in self.scoreboards.values_mut() {
                    scores.remove(target);
                }
            }
        }
    }

    pub fn find_entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_score_auto_initializes_to_zero() {
        let mut world = World::new();
        assert_eq!(world.get_score("health", "p1"), 0);
    }

    #[test]
    fn reset_with_objective_clears_only_that_objective() {
        let mut world = World::new();
        world.set_score("health", "p1", 5);
        world.set_score("mana", "p1", 3);
        world.reset_score("p1", Some("health"));
        assert_eq!(world.get_score("health", "p1"), 0);
        assert_eq!(world.get_score("mana", "p1"), 3);
    }

    #[test]
    fn reset_without_objective_clears_every_objective_for_target() {
        let mut world = World::new();
        world.set_score("health", "p1", 5);
        world.set_score("mana", "p1", 3);
        world.reset_score("p1", None);
        assert_eq!(world.get_score("health", "p1"), 0);
        assert_eq!(world.get_score("mana", "p1"), 0);
    }
}
