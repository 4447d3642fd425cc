//! Built-in worklists used when the config file does not override them.

use crate::types::{TractorRef, VariableName};

/// Variables mined for every tractor, in processing order.
pub const DEFAULT_VARIABLES: [&str; 14] = [
    "rated_power_net",
    "max_power_gross",
    "displacement",
    "torque",
    "numero_de_cilindros",
    "rated_rpm",
    "pump_flow",
    "rear_lift_capacity",
    "shipping_weight",
    "fuel_tank_capacity",
    "wheelbase",
    "height_rops",
    "drive_type",
    "transmission_type",
];

/// (company, model, predefined url). An empty url means "look it up".
const DEFAULT_TRACTORS: &[(&str, &str, &str)] = &[
    ("John Deere", "9570RT", "https://www.tractordata.com/farm-tractors/007/8/9/7890-john-deere-9570rt.html"),
    ("John Deere", "9570R", "https://www.tractordata.com/farm-tractors/007/8/8/7886-john-deere-9570r.html"),
    ("John Deere", "9520RT", "https://www.tractordata.com/farm-tractors/007/8/8/7889-john-deere-9520rt.html"),
    ("John Deere", "9520R", ""),
    ("John Deere", "9470RT", ""),
    ("John Deere", "9470R", ""),
    ("John Deere", "9420R", ""),
    ("John Deere", "9370RT", ""),
    ("John Deere", "8370RT", ""),
    ("John Deere", "8370R", ""),
    ("John Deere", "8345RT", ""),
    ("John Deere", "8345R", ""),
    ("John Deere", "8335R", ""),
    ("John Deere", "8320R", ""),
    ("John Deere", "8295R", ""),
    ("John Deere", "8270R", ""),
    ("John Deere", "7230R", ""),
    ("John Deere", "7210R", ""),
    ("John Deere", "6140M", ""),
    ("John Deere", "6125E", ""),
    ("John Deere", "6110E", ""),
    ("John Deere", "6130E", ""),
    ("John Deere", "6115E", ""),
    ("John Deere", "6100E", ""),
    ("John Deere", "5090EH", ""),
    ("John Deere", "8245R", ""),
    ("John Deere", "6403", ""),
    ("John Deere", "5075E PowrReverse", ""),
    ("John Deere", "5090E", ""),
    ("John Deere", "5055E PowrReverse", ""),
    ("John Deere", "6125M", ""),
    ("John Deere", "6603", ""),
    ("John Deere", "6210J", ""),
    ("John Deere", "6170J", ""),
    ("John Deere", "6155J", ""),
    ("John Deere", "6105J", ""),
    ("John Deere", "6115J", ""),
    ("John Deere", "6190J", ""),
    ("John Deere", "6150J", ""),
    ("John Deere", "6140J", ""),
    ("John Deere", "6135J", ""),
];

pub fn default_variables() -> Vec<VariableName> {
    DEFAULT_VARIABLES.iter().map(|v| VariableName::from(*v)).collect()
}

pub fn default_catalogue() -> Vec<TractorRef> {
    DEFAULT_TRACTORS
        .iter()
        .filter_map(|(company, model, url)| {
            let tractor = TractorRef::new(*company, *model).ok()?;
            Some(if url.is_empty() {
                tractor
            } else {
                tractor.with_source(*url)
            })
        })
        .collect()
}
