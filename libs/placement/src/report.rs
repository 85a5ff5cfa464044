//! Item distribution report.
//!
//! A point-in-time dump of where every item sits and where its demand goes,
//! for logs, tests and operators. Building it walks the whole model, so keep
//! it off hot paths.

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::location::Location;
use crate::model::{LocationDemand, UsageModel};
use crate::Key;

/// Distribution of items across locations and containers.
#[derive(Debug, Clone, Serialize)]
pub struct ItemDistribution {
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub locations: Vec<LocationReport>,
    /// Items with no container or an unresolved container location.
    pub unplaced: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationReport {
    pub location: Location,
    pub containers: Vec<ContainerReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerReport {
    pub container: String,
    pub load: f64,
    pub items: Vec<ItemReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub item: String,
    pub movable: bool,
    /// Total demand by target location, self excluded.
    pub by_location_total: f64,
    pub by_location: LocationDemand,
    /// Total raw demand, self included.
    pub outbound_total: f64,
}

impl<I: Key + Display, C: Key + Display> UsageModel<I, C> {
    /// Build a distribution report from the current state.
    pub fn item_distribution(&self) -> ItemDistribution {
        let locations = self
            .locations()
            .into_iter()
            .map(|location| LocationReport {
                location: location.clone(),
                containers: self
                    .containers_in_location(location)
                    .map(|container| ContainerReport {
                        container: container.to_string(),
                        load: self.container_load(container),
                        items: self
                            .items_on_container(container)
                            .map(|item| self.item_report(item))
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        let unplaced = self
            .items()
            .filter(|item| self.item_location(item).is_none())
            .map(ToString::to_string)
            .collect();

        ItemDistribution {
            model: self.name().to_string(),
            generated_at: Utc::now(),
            locations,
            unplaced,
        }
    }

    fn item_report(&self, item: &I) -> ItemReport {
        let by_location = self.demand_by_target_location(item);
        ItemReport {
            item: item.to_string(),
            movable: self.is_item_movable(item),
            by_location_total: by_location.values().sum(),
            by_location,
            outbound_total: self.item_demand(item).map_or(0.0, |d| d.total()),
        }
    }
}

impl Display for ItemDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Follow-the-sun distribution ({}):", self.model)?;
        for location in &self.locations {
            writeln!(f, "  Location {}", location.location)?;
            for container in &location.containers {
                writeln!(f, "    Container {} (load {})", container.container, container.load)?;
                for item in &container.items {
                    writeln!(f, "      Item {}{}", item.item, if item.movable { "" } else { " [immovable]" })?;
                    writeln!(f, "        by-location: {}: {:?}", item.by_location_total, item.by_location)?;
                    writeln!(f, "        outbound: {}", item.outbound_total)?;
                }
            }
        }
        if !self.unplaced.is_empty() {
            writeln!(f, "  Unplaced: {}", self.unplaced.join(", "))?;
        }
        Ok(())
    }
}
