use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::column::{
    Annotation, HereditaryStratigraphicArtifact, HereditaryStratigraphicColumn, StoreKind, Stratum,
};
use crate::differentia::Differentia;
use crate::errors::{HstratError, Result};
use crate::policies::{RetentionPolicy, StratumRetentionPolicy};

/// Version stamped into every record this crate writes.
pub const HSTRAT_VERSION: &str = env!("CARGO_PKG_VERSION");

static WARNED_VERSION_MISMATCH: AtomicBool = AtomicBool::new(false);

/// Whether a record from another crate version has been read yet.
pub fn has_warned_version_mismatch() -> bool {
    WARNED_VERSION_MISMATCH.load(Ordering::Relaxed)
}

fn check_version(found: &str) {
    if found != HSTRAT_VERSION && !WARNED_VERSION_MISMATCH.swap(true, Ordering::Relaxed) {
        warn!("reading records written by hstrat {found} with hstrat {HSTRAT_VERSION}");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub policy_algo: String,
    pub policy_spec: Value,
    pub hstrat_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratumRecord {
    /// Left out when the policy can recompute it from the column index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u64>,
    pub differentia: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
}

/// A column's stored state. The policy header may be absent inside a
/// [`PopulationRecord`] that hoists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_algo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_spec: Option<Value>,
    pub differentia_bit_width: u8,
    pub strata: Vec<StratumRecord>,
    pub num_strata_deposited: u64,
    pub hstrat_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRecord {
    /// Shared policy header, present when every column uses the same policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_algo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_spec: Option<Value>,
    pub columns: Vec<ColumnRecord>,
    pub hstrat_version: String,
}

pub fn policy_to_records<P>(policy: &P) -> Result<PolicyRecord>
where
    P: StratumRetentionPolicy + Into<RetentionPolicy>,
{
    let policy: RetentionPolicy = policy.clone().into();
    Ok(PolicyRecord {
        policy_algo: policy.algo_identifier().to_string(),
        policy_spec: policy.policy_spec()?,
        hstrat_version: HSTRAT_VERSION.to_string(),
    })
}

/// Rebuild a policy. A version mismatch warns once and carries on.
pub fn policy_from_records(record: &PolicyRecord) -> Result<RetentionPolicy> {
    check_version(&record.hstrat_version);
    RetentionPolicy::from_algo_and_spec(&record.policy_algo, record.policy_spec.clone())
}

pub fn col_to_records<P>(column: &HereditaryStratigraphicColumn<P>) -> Result<ColumnRecord>
where
    P: StratumRetentionPolicy + Into<RetentionPolicy>,
{
    let policy = policy_to_records(column.get_policy())?;
    let omit_rank = column.can_omit_rank_in_store();
    let strata = column
        .iter_retained_strata()
        .map(|stratum| StratumRecord {
            rank: (!omit_rank).then_some(stratum.rank),
            differentia: stratum.differentia.value(),
            annotation: stratum.annotation,
        })
        .collect();
    Ok(ColumnRecord {
        policy_algo: Some(policy.policy_algo),
        policy_spec: Some(policy.policy_spec),
        differentia_bit_width: column.get_stratum_differentia_bit_width(),
        strata,
        num_strata_deposited: column.get_num_strata_deposited(),
        hstrat_version: HSTRAT_VERSION.to_string(),
    })
}

/// Rebuild a column. Its RNG is fresh; call
/// [`reseed`](HereditaryStratigraphicColumn::reseed) for reproducible
/// further deposits.
pub fn col_from_records(record: &ColumnRecord) -> Result<HereditaryStratigraphicColumn> {
    let policy = match (&record.policy_algo, &record.policy_spec) {
        (Some(algo), Some(spec)) => policy_from_records(&PolicyRecord {
            policy_algo: algo.clone(),
            policy_spec: spec.clone(),
            hstrat_version: record.hstrat_version.clone(),
        })?,
        _ => {
            return Err(HstratError::DeserializationError(
                "column record lacks a policy header".into(),
            ))
        }
    };
    col_from_records_with_policy(record, policy)
}

fn col_from_records_with_policy(
    record: &ColumnRecord,
    policy: RetentionPolicy,
) -> Result<HereditaryStratigraphicColumn> {
    check_version(&record.hstrat_version);
    let n = record.num_strata_deposited;
    let strata = record
        .strata
        .iter()
        .enumerate()
        .map(|(index, stratum)| {
            let rank = stratum
                .rank
                .or_else(|| policy.calc_rank_at_column_index(index, n))
                .ok_or_else(|| {
                    HstratError::DeserializationError(format!(
                        "stratum {index} has no rank and {} cannot recover it",
                        policy.algo_identifier()
                    ))
                })?;
            // unmasked so from_parts can reject overwide values
            let differentia = Differentia::new(stratum.differentia, 64);
            Ok(Stratum {
                rank,
                differentia,
                annotation: stratum.annotation.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    HereditaryStratigraphicColumn::from_parts(
        policy,
        record.differentia_bit_width,
        strata,
        n,
        StoreKind::default(),
    )
}

/// Serialize a population, hoisting the policy header when it is shared.
pub fn pop_to_records<P>(population: &[HereditaryStratigraphicColumn<P>]) -> Result<PopulationRecord>
where
    P: StratumRetentionPolicy + Into<RetentionPolicy>,
{
    let mut columns = population
        .iter()
        .map(col_to_records)
        .collect::<Result<Vec<_>>>()?;
    let uniform = population
        .windows(2)
        .all(|pair| pair[0].get_policy() == pair[1].get_policy());
    let (policy_algo, policy_spec) = match columns.first() {
        Some(first) if uniform => (first.policy_algo.clone(), first.policy_spec.clone()),
        _ => (None, None),
    };
    if policy_algo.is_some() {
        for column in &mut columns {
            column.policy_algo = None;
            column.policy_spec = None;
        }
    }
    Ok(PopulationRecord {
        policy_algo,
        policy_spec,
        columns,
        hstrat_version: HSTRAT_VERSION.to_string(),
    })
}

pub fn pop_from_records(record: &PopulationRecord) -> Result<Vec<HereditaryStratigraphicColumn>> {
    let shared = match (&record.policy_algo, &record.policy_spec) {
        (Some(algo), Some(spec)) => Some(policy_from_records(&PolicyRecord {
            policy_algo: algo.clone(),
            policy_spec: spec.clone(),
            hstrat_version: record.hstrat_version.clone(),
        })?),
        _ => None,
    };
    record
        .columns
        .iter()
        .map(|column| match (&shared, column.policy_algo.is_some()) {
            (Some(policy), false) => col_from_records_with_policy(column, policy.clone()),
            _ => col_from_records(column),
        })
        .collect()
}

pub fn col_to_json<P>(column: &HereditaryStratigraphicColumn<P>) -> Result<String>
where
    P: StratumRetentionPolicy + Into<RetentionPolicy>,
{
    Ok(serde_json::to_string(&col_to_records(column)?)?)
}

pub fn col_from_json(json: &str) -> Result<HereditaryStratigraphicColumn> {
    col_from_records(&serde_json::from_str(json)?)
}

pub fn pop_to_json<P>(population: &[HereditaryStratigraphicColumn<P>]) -> Result<String>
where
    P: StratumRetentionPolicy + Into<RetentionPolicy>,
{
    Ok(serde_json::to_string(&pop_to_records(population)?)?)
}

pub fn pop_from_json(json: &str) -> Result<Vec<HereditaryStratigraphicColumn>> {
    pop_from_records(&serde_json::from_str(json)?)
}

pub fn policy_to_json<P>(policy: &P) -> Result<String>
where
    P: StratumRetentionPolicy + Into<RetentionPolicy>,
{
    Ok(serde_json::to_string(&policy_to_records(policy)?)?)
}

pub fn policy_from_json(json: &str) -> Result<RetentionPolicy> {
    policy_from_records(&serde_json::from_str(json)?)
}
