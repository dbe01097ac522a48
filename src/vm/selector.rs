//! Target-selector evaluation, coordinate evaluation, NBT-subset matching,
//! and the range/NBT-filter mini-parsers they depend on.
//!
//! Grounded on `vm.py::eval_target_selector/eval_position/match_nbt/
//! parse_range/parse_nbt_filter`.

use std::collections::BTreeMap;

use super::branch::Branch;
use super::world::{Nbt, World, SERVER};

#[derive(Debug)]
pub enum SelectorError {
    RestrictedSelector(String),
    InvalidRange(String),
    InvalidNbtFilter(String),
    InvalidScoreSpec(String),
}

impl std::fmt::Display for SelectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorError::RestrictedSelector(s) => {
                write!(f, "only @e or @s selector is permitted: {s}")
            }
            SelectorError::InvalidRange(s) => write!(f, "invalid range specification: {s}"),
            SelectorError::InvalidNbtFilter(s) => write!(f, "invalid NBT filter: {s}"),
            SelectorError::InvalidScoreSpec(s) => write!(f, "invalid score specification: {s}"),
        }
    }
}

/// An inclusive/exclusive bound pair; `None` means unbounded on that side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl Range {
    pub fn contains(&self, value: f64) -> bool {
        if let Some(start) = self.start {
            if value < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if value > end {
                return false;
            }
        }
        true
    }
}

/// Parse `"[start]..[end]"`, a bare `"n"`, or `"..n"` / `"n.."`.
pub fn parse_range(spec: &str) -> Result<Range, SelectorError> {
    let strip = |s: &str| -> String {
        let s = s.trim();
        if s.starts_with('[') && s.ends_with(']') {
            s[1..s.len() - 1].trim().to_string()
        } else {
            s.to_string()
        }
    };

    if !spec.contains("..") {
        let value: f64 = strip(spec)
            .parse()
            .map_err(|_| SelectorError::InvalidRange(spec.to_string()))?;
        return Ok(Range {
            start: Some(value),
            end: Some(value),
        });
    }

    let parts: Vec<&str> = spec.split("..").collect();
    if parts.len() != 2 {
        return Err(SelectorError::InvalidRange(spec.to_string()));
    }
    let parse_bound = |s: &str| -> Result<Option<f64>, SelectorError> {
        let stripped = strip(s);
        if stripped.is_empty() {
            Ok(None)
        } else {
            stripped
                .parse()
                .map(Some)
                .map_err(|_| SelectorError::InvalidRange(spec.to_string()))
        }
    };
    Ok(Range {
        start: parse_bound(parts[0])?,
        end: parse_bound(parts[1])?,
    })
}

/// Range semantics for `if_score`/`unless_score matches <range>`: missing
/// start defaults to 0, missing end defaults to 1,000,000, half-open `[start, end)`.
pub fn score_matches(range: &str, value: i64) -> Result<bool, SelectorError> {
    let parsed = parse_range(range)?;
    let start = parsed.start.unwrap_or(0.0) as i64;
    let end = parsed.end.map(|e| e as i64).unwrap_or(1_000_000);
    Ok(value >= start && value < end)
}

/// A very small SNBT-subset parser for selector `nbt=` filters.
pub fn parse_nbt_filter(text: &str) -> Result<Nbt, SelectorError> {
    let text = text.trim();
    if !(text.starts_with('{') && text.ends_with('}')) {
        return Err(SelectorError::InvalidNbtFilter(text.to_string()));
    }
    let content = text[1..text.len() - 1].trim();
    let mut map = BTreeMap::new();
    if content.is_empty() {
        return Ok(Nbt::Compound(map));
    }
    for part in split_top_level_commas(content) {
        let (key, value) = part
            .split_once(':')
            .ok_or_else(|| SelectorError::InvalidNbtFilter(part.clone()))?;
        map.insert(key.trim().to_string(), parse_nbt_value(value.trim()));
    }
    Ok(Nbt::Compound(map))
}

fn split_top_level_commas(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn parse_nbt_value(value: &str) -> Nbt {
    if value.starts_with('[') && value.ends_with(']') {
        let inner = &value[1..value.len() - 1];
        if inner.trim().is_empty() {
            return Nbt::List(Vec::new());
        }
        return Nbt::List(
            inner
                .split(',')
                .map(|item| parse_scalar(item.trim()))
                .collect(),
        );
    }
    parse_scalar(value)
}

fn parse_scalar(value: &str) -> Nbt {
    if let Some(digits) = value.strip_suffix('d') {
        if let Ok(d) = digits.parse::<f64>() {
            return Nbt::Double(d);
        }
    }
    if let Ok(i) = value.parse::<i64>() {
        return Nbt::Int(i);
    }
    Nbt::String(value.to_string())
}

/// `filter_nbt` is a subset match against `target_nbt`: every key/value pair
/// in the filter must be present (recursively) in the target.
pub fn match_nbt(filter_nbt: &Nbt, target_nbt: &Nbt) -> bool {
    match (filter_nbt, target_nbt) {
        (Nbt::Compound(filter), Nbt::Compound(target)) => filter.iter().all(|(key, f_val)| {
            target
                .get(key)
                .map(|t_val| match_nbt(f_val, t_val))
                .unwrap_or(false)
        }),
        (Nbt::List(filter), Nbt::List(target)) => {
            let all_ints = filter.iter().all(|v| matches!(v, Nbt::Int(_)));
            if all_ints {
                filter == target
            } else if filter.is_empty() {
                target.is_empty()
            } else {
                filter.iter().all(|item| target.contains(item))
            }
        }
        (a, b) => a == b,
    }
}

fn distance(a: (f64, f64, f64), b: (f64, f64, f64)) -> f64 {
    let (dx, dy, dz) = (a.0 - b.0, a.1 - b.1, a.2 - b.2);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// The entity identity returned by selector evaluation: either the server
/// sentinel or a specific entity id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Executor {
    Server,
    Entity(String),
}

impl Executor {
    pub fn as_str(&self) -> &str {
        match self {
            Executor::Server => SERVER,
            Executor::Entity(id) => id,
        }
    }
}

/// Evaluate `@s`/`@e[...]` (or a literal token) against current world state,
/// applying every filter in spec.md §4.4's fixed pipeline order.
pub fn eval_target_selector(
    world: &World,
    branch: &Branch,
    selector: &str,
) -> Result<Vec<Executor>, SelectorError> {
    if !selector.starts_with('@') {
        return Ok(vec![Executor::Entity(selector.to_string())]);
    }

    let head = selector.split('[').next().unwrap_or(selector);
    if head != "@e" && head != "@s" {
        return Err(SelectorError::RestrictedSelector(selector.to_string()));
    }

    if head == "@s" {
        return Ok(vec![branch.executor.clone()]);
    }

    let mut included: Vec<&super::world::Entity> = world.entities.iter().collect();

    let Some(bracket_start) = selector.find('[') else {
        return Ok(included
            .into_iter()
            .map(|e| Executor::Entity(e.id.clone()))
            .collect());
    };
    let inner = selector[bracket_start + 1..].trim_end_matches(']');
    let mut args: BTreeMap<String, String> = BTreeMap::new();
    for pair in split_top_level_commas(inner) {
        if let Some((k, v)) = pair.split_once('=') {
            args.insert(k.trim().to_string(), v.trim().to_string());
        }
    }

    if let Some(type_filter) = args.get("type") {
        included.retain(|e| &e.kind == type_filter);
    }

    if let Some(dist_spec) = args.get("distance") {
        let range = parse_range(dist_spec)?;
        included.retain(|e| range.contains(distance(e.position, branch.position)));
    }

    if let Some(scores_spec) = args.get("scores") {
        let trimmed = scores_spec.trim().trim_start_matches('{').trim_end_matches('}');
        for spec in trimmed.split(',') {
            let (objective, value_str) = spec
                .split_once('=')
                .ok_or_else(|| SelectorError::InvalidScoreSpec(spec.to_string()))?;
            let objective = objective.trim();
            let value_str = value_str.trim();
            if value_str.contains("..") {
                let range = parse_range(value_str)?;
                included.retain(|e| {
                    let score = world
                        .scoreboards
                        .get(objective)
                        .and_then(|m| m.get(&e.id))
                        .copied()
                        .unwrap_or(0);
                    range.contains(score as f64)
                });
            } else {
                let target: i64 = value_str
                    .parse()
                    .map_err(|_| SelectorError::InvalidScoreSpec(spec.to_string()))?;
                included.retain(|e| {
                    world
                        .scoreboards
                        .get(objective)
                        .and_then(|m| m.get(&e.id))
                        .copied()
                        .unwrap_or(0)
                        == target
                });
            }
        }
    }

    if let Some(tag) = args.get("tag") {
        if let Some(negated) = tag.strip_prefix('!') {
            included.retain(|e| !e.tags.iter().any(|t| t == negated));
        } else {
            included.retain(|e| e.tags.iter().any(|t| t == tag));
        }
    }

    if let Some(name) = args.get("name") {
        if let Some(negated) = name.strip_prefix('!') {
            included.retain(|e| e.custom_name.as_deref() != Some(negated));
        } else {
            included.retain(|e| e.custom_name.as_deref() == Some(name.as_str()));
        }
    }

    if let Some(nbt_spec) = args.get("nbt") {
        let (negate, spec) = match nbt_spec.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, nbt_spec.as_str()),
        };
        let filter = parse_nbt_filter(spec)?;
        included.retain(|e| {
            let matches = e.nbt.as_ref().map(|n| match_nbt(&filter, n)).unwrap_or(false);
            matches != negate
        });
    }

    let coord_axes = [("x", "dx", 0), ("y", "dy", 1), ("z", "dz", 2)];
    let mut region: Vec<(usize, f64, f64)> = Vec::new();
    for (axis, d_axis, idx) in coord_axes {
        if let Some(base_str) = args.get(axis) {
            let base: f64 = base_str.parse().unwrap_or(0.0);
            let d: f64 = args.get(d_axis).and_then(|s| s.parse().ok()).unwrap_or(0.0);
            let (min, max) = if d >= 0.0 {
                (base, base + d + 1.0)
            } else {
                (base + d, base + 1.0)
            };
            region.push((idx, min, max));
        }
    }
    if !region.is_empty() {
        included.retain(|e| {
            let pos = [e.position.0, e.position.1, e.position.2];
            region.iter().all(|(idx, min, max)| pos[*idx] >= *min && pos[*idx] < *max)
        });
    }

    if let Some(sort) = args.get("sort") {
        match sort.as_str() {
            "nearest" => included.sort_by(|a, b| {
                distance(a.position, branch.position)
                    .partial_cmp(&distance(b.position, branch.position))
                    .unwrap()
            }),
            "furthest" => included.sort_by(|a, b| {
                distance(b.position, branch.position)
                    .partial_cmp(&distance(a.position, branch.position))
                    .unwrap()
            }),
            // "random" would need a supplied RNG; "arbitrary" is a no-op.
            // Randomization is left to the caller (see vm::exec).
            _ => {}
        }
    }

    if let Some(limit) = args.get("limit") {
        if let Ok(n) = limit.parse::<usize>() {
            included.truncate(n);
        }
    }

    Ok(included.into_iter().map(|e| Executor::Entity(e.id.clone())).collect())
}

/// Evaluate three coordinate strings into a world position, handling caret
/// (camera-relative), tilde (position-relative), and absolute forms.
pub fn eval_position(branch: &Branch, x: &str, y: &str, z: &str) -> (f64, f64, f64) {
    let (base_x, base_y, base_z) = branch.position;

    if x.starts_with('^') || y.starts_with('^') || z.starts_with('^') {
        let caret = |s: &str| -> f64 {
            if s == "^" {
                0.0
            } else {
                s.strip_prefix('^').and_then(|n| n.parse().ok()).unwrap_or(0.0)
            }
        };
        let (dx, dy, dz) = (caret(x), caret(y), caret(z));

        let (yaw_deg, pitch_deg) = branch.facing;
        let yaw = yaw_deg.to_radians();
        let pitch = pitch_deg.to_radians();

        let f = (-yaw.sin() * pitch.cos(), pitch.sin(), yaw.cos() * pitch.cos());
        let r = (yaw.cos(), 0.0, yaw.sin());
        let up = (f.1 * r.2 - f.2 * r.1, f.2 * r.0 - f.0 * r.2, f.0 * r.1 - f.1 * r.0);

        return (
            base_x + dx * r.0 + dy * up.0 + dz * f.0,
            base_y + dx * r.1 + dy * up.1 + dz * f.1,
            base_z + dx * r.2 + dy * up.2 + dz * f.2,
        );
    }

    let coord = |s: &str, base: f64| -> f64 {
        if let Some(rest) = s.strip_prefix('~') {
            if rest.is_empty() {
                base
            } else {
                base + rest.parse::<f64>().unwrap_or(0.0)
            }
        } else {
            s.parse().unwrap_or(base)
        }
    };

    (coord(x, base_x), coord(y, base_y), coord(z, base_z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::branch::Branch;
    use crate::vm::world::Entity;

    #[test]
    fn parse_range_with_both_bounds() {
        let r = parse_range("[4]..[8]").unwrap();
        assert_eq!(r.start, Some(4.0));
        assert_eq!(r.end, Some(8.0));
    }

    #[test]
    fn parse_range_single_value_is_exact() {
        let r = parse_range("5").unwrap();
        assert_eq!(r.start, Some(5.0));
        assert_eq!(r.end, Some(5.0));
    }

    #[test]
    fn parse_range_open_ended() {
        let r = parse_range("..8").unwrap();
        assert_eq!(r.start, None);
        assert_eq!(r.end, Some(8.0));
    }

    #[test]
    fn score_matches_defaults_start_zero_end_one_million() {
        assert!(score_matches("..", 500_000).unwrap());
        assert!(!score_matches("..", -1).unwrap());
    }

    #[test]
    fn match_nbt_numeric_array_requires_exact_equality() {
        let filter = parse_nbt_filter("{list:[1,2,3]}").unwrap();
        let target_eq = parse_nbt_filter("{list:[1,2,3]}").unwrap();
        let target_ne = parse_nbt_filter("{list:[1,2]}").unwrap();
        assert!(match_nbt(&filter, &target_eq));
        assert!(!match_nbt(&filter, &target_ne));
    }

    #[test]
    fn match_nbt_string_list_is_subset_match() {
        let filter = parse_nbt_filter("{tags:[a]}").unwrap();
        let target = parse_nbt_filter("{tags:[a,b]}").unwrap();
        assert!(match_nbt(&filter, &target));
    }

    #[test]
    fn eval_position_tilde_adds_offset_to_current() {
        let mut branch = Branch::root();
        branch.position = (10.0, 0.0, 0.0);
        let pos = eval_position(&branch, "~5", "~", "~-2");
        assert_eq!(pos, (15.0, 0.0, -2.0));
    }

    #[test]
    fn eval_position_absolute_ignores_current() {
        let branch = Branch::root();
        let pos = eval_position(&branch, "1", "2", "3");
        assert_eq!(pos, (1.0, 2.0, 3.0));
    }

    #[test]
    fn at_selector_restricted_to_e_or_s() {
        let world = World::new();
        let branch = Branch::root();
        assert!(matches!(
            eval_target_selector(&world, &branch, "@a"),
            Err(SelectorError::RestrictedSelector(_))
        ));
    }

    #[test]
    fn selector_limit_truncates() {
        let mut world = World::new();
        for i in 0..5 {
            world.entities.push(Entity {
                id: format!("e{i}"),
                kind: "zombie".to_string(),
                ..Default::default()
            });
        }
        let branch = Branch::root();
        let result = eval_target_selector(&world, &branch, "@e[limit=2]").unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn sort_nearest_then_limit_returns_closest_entities_in_order() {
        let mut world = World::new();
        for (id, dist) in [("far", 20.0), ("near", 1.0), ("mid", 5.0)] {
            world.entities.push(Entity {
                id: id.to_string(),
                kind: "zombie".to_string(),
                position: (dist, 0.0, 0.0),
                ..Default::default()
            });
        }
        let branch = Branch::root();
        let result = eval_target_selector(&world, &branch, "@e[sort=nearest,limit=2]").unwrap();
        let ids: Vec<&str> = result
            .iter()
            .map(|e| match e {
                Executor::Entity(id) => id.as_str(),
                Executor::Server => "SERVER",
            })
            .collect();
        assert_eq!(ids, vec!["near", "mid"]);
    }

    #[test]
    fn match_nbt_is_monotone_under_superset_growth() {
        let filter = parse_nbt_filter("{tags:[a]}").unwrap();
        let narrow = parse_nbt_filter("{tags:[a]}").unwrap();
        let wider = parse_nbt_filter("{tags:[a,b,c]}").unwrap();
        assert!(match_nbt(&filter, &narrow));
        assert!(match_nbt(&filter, &wider));
    }
}
