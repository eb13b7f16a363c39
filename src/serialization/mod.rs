//! Record formats for policies, columns and populations, plus import of
//! dstream-packed specimens.

mod dstream;
mod records;

pub use dstream::{
    assemblage_from_dstream_records, specimens_from_dstream_records, CircularAlgo, DstreamLookup,
    DstreamRecord, SteadyAlgo, StretchedAlgo, TiltedAlgo,
};
pub use records::{
    col_from_json, col_from_records, col_to_json, col_to_records, has_warned_version_mismatch,
    policy_from_json, policy_from_records, policy_to_json, policy_to_records, pop_from_json,
    pop_from_records, pop_to_json, pop_to_records, ColumnRecord, PolicyRecord, PopulationRecord,
    StratumRecord, HSTRAT_VERSION,
};
