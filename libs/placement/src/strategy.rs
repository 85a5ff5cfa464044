//! Follow-the-sun placement decisions.
//!
//! Given a model snapshot, decide for one item whether it should stay put or
//! move, and where. Decisions are pure: the caller performs the move and
//! reports it back through [`UsageModel::on_item_moved`].

use crate::error::ParameterError;
use crate::location::Location;
use crate::model::{best_location, UsageModel};
use crate::params::FollowTheSunParameters;
use crate::Key;

/// Why an item was left where it is.
#[derive(Debug, Clone, PartialEq)]
pub enum StayReason {
    /// The item is not tracked by the model.
    Unknown,

    /// The item is flagged immovable.
    Immovable,

    /// The item has no container, or its container's location is unresolved.
    Unplaced,

    /// No demand toward any located target (or only toward itself).
    NoDemand,

    /// The best allowed location is where the item already is.
    AlreadyOptimal,

    /// The improvement does not exceed the significance margin.
    BelowMargin { current_weight: f64, best_weight: f64 },

    /// No other container is known in the best location.
    NoContainer { location: Location },
}

/// A move the strategy wants performed.
#[derive(Debug, Clone, PartialEq)]
pub struct Relocation<C> {
    pub from: Location,
    pub to: Location,
    pub container: C,
    pub current_weight: f64,
    pub best_weight: f64,
}

/// Outcome of evaluating one item.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<C> {
    Stay(StayReason),
    Relocate(Relocation<C>),
}

impl<C> Decision<C> {
    /// Returns true if the decision is to move the item.
    pub fn is_relocation(&self) -> bool {
        matches!(self, Self::Relocate(_))
    }
}

/// Hysteresis-based follow-the-sun strategy.
#[derive(Debug, Clone)]
pub struct FollowTheSunStrategy {
    params: FollowTheSunParameters,
}

impl FollowTheSunStrategy {
    /// Create a strategy, validating its parameters.
    pub fn new(params: FollowTheSunParameters) -> Result<Self, ParameterError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// The parameters in use.
    pub fn params(&self) -> &FollowTheSunParameters {
        &self.params
    }

    /// Decide what to do with `item` given the current model.
    pub fn decide<I: Key, C: Key>(&self, model: &UsageModel<I, C>, item: &I) -> Decision<C> {
        if !model.has_item(item) {
            return Decision::Stay(StayReason::Unknown);
        }
        if !model.is_item_movable(item) {
            return Decision::Stay(StayReason::Immovable);
        }
        let Some(current) = model.item_location(item) else {
            return Decision::Stay(StayReason::Unplaced);
        };

        let view = model.demand_by_target_location(item);
        let Some((best, best_weight)) = best_location(&view, |l| self.params.allows(l)) else {
            return Decision::Stay(StayReason::NoDemand);
        };
        if best == current {
            return Decision::Stay(StayReason::AlreadyOptimal);
        }

        let current_weight = view.get(current).copied().unwrap_or(0.0);
        if !self.params.is_significant(current_weight, best_weight) {
            return Decision::Stay(StayReason::BelowMargin {
                current_weight,
                best_weight,
            });
        }

        let decision = match model.available_containers_for(item, best).next() {
            Some(container) => Decision::Relocate(Relocation {
                from: current.clone(),
                to: best.clone(),
                container: container.clone(),
                current_weight,
                best_weight,
            }),
            None => Decision::Stay(StayReason::NoContainer {
                location: best.clone(),
            }),
        };
        decision
    }
}

impl Default for FollowTheSunStrategy {
    fn default() -> Self {
        Self {
            params: FollowTheSunParameters::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::DemandVector;

    type Model = UsageModel<&'static str, &'static str>;

    fn loc(name: &str) -> Location {
        Location::new(name)
    }

    fn demand(entries: &[(&'static str, f64)]) -> DemandVector<&'static str> {
        entries.iter().copied().collect()
    }

    fn model_with(items: &[(&'static str, &'static str, bool)]) -> Model {
        let mut model = Model::new("test");
        model.on_container_added("A", Some(loc("loc1")));
        model.on_container_added("B", Some(loc("loc2")));
        for (item, container, immovable) in items {
            model.on_item_added(*item, Some(*container), *immovable);
        }
        model
    }

    #[test]
    fn test_follows_demand() {
        let mut model = model_with(&[("1", "A", false), ("2", "B", false)]);
        model.update_item_usage(&"1", demand(&[("2", 100.0)]));

        let decision = FollowTheSunStrategy::default().decide(&model, &"1");
        assert_eq!(
            decision,
            Decision::Relocate(Relocation {
                from: loc("loc1"),
                to: loc("loc2"),
                container: "B",
                current_weight: 0.0,
                best_weight: 100.0,
            })
        );
    }

    #[test]
    fn test_similar_demand_stays() {
        let mut model = model_with(&[("1", "A", false), ("2", "A", false), ("3", "B", false)]);
        model.update_item_usage(&"1", demand(&[("2", 100.0), ("3", 100.1)]));

        let decision = FollowTheSunStrategy::default().decide(&model, &"1");
        assert!(matches!(decision, Decision::Stay(StayReason::BelowMargin { .. })));
    }

    #[test]
    fn test_self_demand_only_stays() {
        let mut model = model_with(&[("1", "A", false), ("2", "B", false)]);
        model.update_item_usage(&"1", demand(&[("1", 100.0)]));

        let decision = FollowTheSunStrategy::default().decide(&model, &"1");
        assert_eq!(decision, Decision::Stay(StayReason::NoDemand));
    }

    #[test]
    fn test_self_demand_not_counted_for_current_location() {
        // 200 to itself in loc1 must not outweigh 50 toward loc2.
        let mut model = model_with(&[("1", "A", false), ("2", "B", false)]);
        model.update_item_usage(&"1", demand(&[("1", 200.0), ("2", 50.0)]));

        let decision = FollowTheSunStrategy::default().decide(&model, &"1");
        assert!(decision.is_relocation());
    }

    #[test]
    fn test_immovable_stays() {
        let mut model = model_with(&[("1", "A", true), ("2", "B", false)]);
        model.update_item_usage(&"1", demand(&[("2", 1.0e6)]));

        let decision = FollowTheSunStrategy::default().decide(&model, &"1");
        assert_eq!(decision, Decision::Stay(StayReason::Immovable));
    }

    #[test]
    fn test_immovable_demand_still_attracts_others() {
        let mut model = model_with(&[("1", "A", true), ("2", "B", false)]);
        model.update_item_usage(&"2", demand(&[("1", 100.0)]));

        let decision = FollowTheSunStrategy::default().decide(&model, &"2");
        assert!(decision.is_relocation());
    }

    #[test]
    fn test_already_optimal() {
        let mut model = model_with(&[("1", "A", false), ("2", "A", false)]);
        model.update_item_usage(&"1", demand(&[("2", 100.0)]));

        let decision = FollowTheSunStrategy::default().decide(&model, &"1");
        assert_eq!(decision, Decision::Stay(StayReason::AlreadyOptimal));
    }

    #[test]
    fn test_unplaced_item_stays() {
        let mut model = model_with(&[("2", "B", false)]);
        model.on_item_added("1", None, false);
        model.update_item_usage(&"1", demand(&[("2", 100.0)]));

        let decision = FollowTheSunStrategy::default().decide(&model, &"1");
        assert_eq!(decision, Decision::Stay(StayReason::Unplaced));
    }

    #[test]
    fn test_excluded_location_never_chosen() {
        let mut model = model_with(&[("1", "A", false), ("2", "B", false)]);
        model.update_item_usage(&"1", demand(&[("2", 100.0)]));

        let mut params = FollowTheSunParameters::default();
        params.excluded_locations.insert(loc("loc2"));
        let strategy = FollowTheSunStrategy::new(params).unwrap();

        assert_eq!(strategy.decide(&model, &"1"), Decision::Stay(StayReason::NoDemand));
    }

    #[test]
    fn test_unknown_item() {
        let model = model_with(&[]);
        let decision = FollowTheSunStrategy::default().decide(&model, &"ghost");
        assert_eq!(decision, Decision::Stay(StayReason::Unknown));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let params = FollowTheSunParameters {
            trigger_ratio: 0.5,
            ..Default::default()
        };
        assert!(FollowTheSunStrategy::new(params).is_err());
    }
}
