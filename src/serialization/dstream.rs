//! Import of specimens packed by a dstream downstream buffer.
//!
//! Each record carries a hex bitstring holding a deposit counter `T` and a
//! buffer of `S` fixed-width differentia sites. A [`DstreamLookup`] maps
//! `(S, T)` to the rank stored at each site.

use serde::{Deserialize, Serialize};

use crate::differentia::Differentia;
use crate::{bit_floor, bit_length};
use crate::errors::{check_bit_width, HstratError, Result};
use crate::specimen::{HereditaryStratigraphicAssemblage, HereditaryStratigraphicSpecimen};

/// One row of a dstream dataframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DstreamRecord {
    pub data_hex: String,
    pub dstream_algo: String,
    pub dstream_storage_bitoffset: usize,
    pub dstream_storage_bitwidth: usize,
    #[serde(rename = "dstream_T_bitoffset")]
    pub dstream_t_bitoffset: usize,
    #[serde(rename = "dstream_T_bitwidth")]
    pub dstream_t_bitwidth: usize,
    #[serde(rename = "dstream_S")]
    pub dstream_s: u64,
}

/// Site-to-rank mapping of a downstream buffer algorithm.
pub trait DstreamLookup: Send + Sync {
    /// Name as it appears in `dstream_algo`.
    fn algo_identifier(&self) -> &str;

    /// Rank held by each of the `buffer_size` sites after `num_ingests`
    /// ingests, `None` for sites not yet written.
    fn lookup_ingest_times(&self, buffer_size: u64, num_ingests: u64) -> Result<Vec<Option<u64>>>;
}

/// Ring buffer: ingest `t` overwrites site `t mod S`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircularAlgo;

impl DstreamLookup for CircularAlgo {
    fn algo_identifier(&self) -> &str {
        "dstream.circular_algo"
    }

    fn lookup_ingest_times(&self, buffer_size: u64, num_ingests: u64) -> Result<Vec<Option<u64>>> {
        if buffer_size == 0 {
            return Err(HstratError::DeserializationError(
                "circular buffer needs at least one site".into(),
            ));
        }
        Ok((0..buffer_size)
            .map(|site| {
                (site < num_ingests)
                    .then(|| site + buffer_size * ((num_ingests - 1 - site) / buffer_size))
            })
            .collect())
    }
}

/// Evenly spaced retention across the whole history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SteadyAlgo;

/// Retention dense at the start of history and sparse toward the present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StretchedAlgo;

/// Retention dense toward the present and sparse at the start of history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TiltedAlgo;

impl SteadyAlgo {
    /// Site written by ingest `ingest`, `None` if it is discarded.
    ///
    /// Incidence `i` of hanoi value `h` owns a segment; segment widths
    /// shrink with the bit length of `i`, and `h` cycles through the
    /// segment modulo its width.
    pub fn assign_storage_site(buffer_size: u64, ingest: u64) -> Option<u64> {
        let s = bit_length(buffer_size).saturating_sub(1);
        let h = u64::from((ingest + 1).trailing_zeros());
        let epoch = bit_length(ingest) as i64 - s as i64;
        if (h as i64) < epoch {
            return None;
        }
        let incidence = ingest.checked_shr(h as u32 + 1).unwrap_or(0);
        let (segment_start, width) = if incidence == 0 {
            (0, s + 1)
        } else {
            let level = bit_length(incidence);
            let width = s.checked_sub(level).filter(|&w| w > 0)?;
            let first = 1u64 << (level - 1);
            (first * (s + 2 - level) + width * (incidence - first), width)
        };
        Some(segment_start + h % width)
    }
}

/// Meta-epoch of epoch `t`; bunch reservations halve once per meta-epoch.
fn meta_epoch(epoch: u64) -> u64 {
    let bits = bit_length(epoch);
    bits - u64::from(bit_floor(epoch << 1) > epoch + bits)
}

/// First site of the bunch filled `logical`-th.
///
/// Bunches interleave by nesting level: logical bunch 1 sits mid-buffer,
/// 2 and 3 at the quarters, and so on. Bunch 0 spans `s + 1` sites.
fn bunch_site(buffer_size: u64, logical: u64) -> u64 {
    let level = bit_length(logical);
    let spacing = if level == 0 { 0 } else { buffer_size >> level };
    let physical = (spacing >> 1) + spacing * (logical - bit_floor(logical));
    let ruler = ((u128::from(buffer_size) << 1) - u128::from(physical)).count_ones();
    (physical << 1) + u64::from(ruler) - 1 - u64::from(logical > 0)
}

/// `(hanoi value, incidence, epoch, meta-epoch)` of an ingest.
fn hanoi_coordinates(buffer_size: u64, ingest: u64) -> (u64, u64, u64, u64) {
    let s = bit_length(buffer_size).saturating_sub(1);
    let epoch = bit_length(ingest).saturating_sub(s);
    let h = u64::from((ingest + 1).trailing_zeros());
    let incidence = ingest.checked_shr(h as u32 + 1).unwrap_or(0);
    (h, incidence, epoch, meta_epoch(epoch))
}

impl StretchedAlgo {
    /// Site written by ingest `ingest`, `None` if it is discarded.
    ///
    /// Keeps the first few incidences of each hanoi value; fewer are kept
    /// as the meta-epoch advances.
    pub fn assign_storage_site(buffer_size: u64, ingest: u64) -> Option<u64> {
        let (h, incidence, _, tau) = hanoi_coordinates(buffer_size, ingest);
        let reserved = (buffer_size >> (tau + 1)).max(1);
        (incidence < reserved).then(|| bunch_site(buffer_size, incidence) + h)
    }
}

impl TiltedAlgo {
    /// Site written by ingest `ingest`. Every ingest is stored.
    ///
    /// Keeps the latest few incidences of each hanoi value, cycling them
    /// through the bunches reserved for it.
    pub fn assign_storage_site(buffer_size: u64, ingest: u64) -> Option<u64> {
        let (h, incidence, epoch, tau) = hanoi_coordinates(buffer_size, ingest);
        let opening = (1u64 << tau) - tau;
        let next_opening = (1u64 << (tau + 1)) - (tau + 1);
        let uninvaded = epoch < h + opening && h + opening < next_opening;
        let reserved = (buffer_size >> (tau + 1 - u64::from(uninvaded))).max(1);
        Some(bunch_site(buffer_size, incidence % reserved) + h)
    }
}

fn check_surface(buffer_size: u64, num_ingests: u64, bounded: bool) -> Result<()> {
    if buffer_size < 2 || !buffer_size.is_power_of_two() {
        return Err(HstratError::DeserializationError(format!(
            "buffer size {buffer_size} is not a power of two of at least 2"
        )));
    }
    // stretched and tilted buffers hold at most 2^S - 1 ingests
    if bounded && buffer_size < 64 && num_ingests > (1u64 << buffer_size) - 1 {
        return Err(HstratError::DeserializationError(format!(
            "{num_ingests} ingests exceed the capacity of a {buffer_size}-site buffer"
        )));
    }
    Ok(())
}

/// Replay the ingests that can still be resident, oldest first.
///
/// Ingest `(2i + 1) * 2^h - 1` is the `i`-th incidence of hanoi value `h`.
/// Within one `(h, bit length of i)` group, older incidences land where
/// the latest `buffer_size` ones do, so only those are replayed.
fn replay_resident_ingests(
    buffer_size: u64,
    num_ingests: u64,
    assign: impl Fn(u64, u64) -> Option<u64>,
) -> Result<Vec<Option<u64>>> {
    let mut ingests = Vec::new();
    for h in 0..64u32 {
        let odd_limit = num_ingests >> h;
        if odd_limit == 0 {
            break;
        }
        let max_incidence = (odd_limit - 1) / 2;
        for level in 0..64 - h {
            let (first, last) = match level {
                0 => (0, 0),
                _ => (1u64 << (level - 1), (1u64 << level) - 1),
            };
            if first > max_incidence {
                break;
            }
            let hi = last.min(max_incidence);
            let lo = first.max((hi + 1).saturating_sub(buffer_size));
            ingests.extend((lo..=hi).map(|incidence| ((2 * incidence + 1) << h) - 1));
        }
    }
    ingests.sort_unstable();

    let len = usize::try_from(buffer_size).map_err(|_| {
        HstratError::DeserializationError(format!("buffer size {buffer_size} too large"))
    })?;
    let mut sites = vec![None; len];
    for ingest in ingests {
        if let Some(site) = assign(buffer_size, ingest) {
            let index = site as usize;
            *sites
                .get_mut(index)
                .ok_or(HstratError::IndexOutOfBounds { index, len })? = Some(ingest);
        }
    }
    Ok(sites)
}

impl DstreamLookup for SteadyAlgo {
    fn algo_identifier(&self) -> &str {
        "dstream.steady_algo"
    }

    fn lookup_ingest_times(&self, buffer_size: u64, num_ingests: u64) -> Result<Vec<Option<u64>>> {
        check_surface(buffer_size, num_ingests, false)?;
        replay_resident_ingests(buffer_size, num_ingests, Self::assign_storage_site)
    }
}

impl DstreamLookup for StretchedAlgo {
    fn algo_identifier(&self) -> &str {
        "dstream.stretched_algo"
    }

    fn lookup_ingest_times(&self, buffer_size: u64, num_ingests: u64) -> Result<Vec<Option<u64>>> {
        check_surface(buffer_size, num_ingests, true)?;
        replay_resident_ingests(buffer_size, num_ingests, Self::assign_storage_site)
    }
}

impl DstreamLookup for TiltedAlgo {
    fn algo_identifier(&self) -> &str {
        "dstream.tilted_algo"
    }

    fn lookup_ingest_times(&self, buffer_size: u64, num_ingests: u64) -> Result<Vec<Option<u64>>> {
        check_surface(buffer_size, num_ingests, true)?;
        replay_resident_ingests(buffer_size, num_ingests, Self::assign_storage_site)
    }
}

static BUILTIN_LOOKUPS: [&dyn DstreamLookup; 4] =
    [&CircularAlgo, &SteadyAlgo, &StretchedAlgo, &TiltedAlgo];

fn find_lookup<'a>(algo: &str, extra: &[&'a dyn DstreamLookup]) -> Result<&'a dyn DstreamLookup> {
    extra
        .iter()
        .copied()
        .chain(BUILTIN_LOOKUPS.iter().copied())
        .find(|lookup| lookup.algo_identifier() == algo)
        .ok_or_else(|| HstratError::UnknownDstreamAlgorithm(algo.to_string()))
}

/// Big-endian read of `bit_width` bits starting `bit_offset` bits in.
fn read_bits(bytes: &[u8], bit_offset: usize, bit_width: usize) -> Result<u64> {
    if bit_width > 64 {
        return Err(HstratError::DeserializationError(format!(
            "{bit_width}-bit field does not fit in 64 bits"
        )));
    }
    let end = bit_offset + bit_width;
    if end > bytes.len() * 8 {
        return Err(HstratError::IndexOutOfBounds {
            index: end,
            len: bytes.len() * 8,
        });
    }
    Ok((bit_offset..end).fold(0u64, |acc, bit| {
        let set = bytes[bit / 8] >> (7 - bit % 8) & 1;
        (acc << 1) | u64::from(set)
    }))
}

fn decode_record(
    record: &DstreamRecord,
    extra: &[&dyn DstreamLookup],
) -> Result<HereditaryStratigraphicSpecimen> {
    let lookup = find_lookup(&record.dstream_algo, extra)?;
    let bytes = hex::decode(&record.data_hex)?;
    let num_ingests = read_bits(&bytes, record.dstream_t_bitoffset, record.dstream_t_bitwidth)?;

    let buffer_size = record.dstream_s;
    if buffer_size == 0 || record.dstream_storage_bitwidth as u64 % buffer_size != 0 {
        return Err(HstratError::DeserializationError(format!(
            "storage of {} bits does not split into {buffer_size} sites",
            record.dstream_storage_bitwidth
        )));
    }
    let site_width = record.dstream_storage_bitwidth as u64 / buffer_size;
    let bit_width = check_bit_width(u8::try_from(site_width).unwrap_or(0))?;
    let storage_end = record.dstream_storage_bitoffset + record.dstream_storage_bitwidth;
    if storage_end > bytes.len() * 8 {
        return Err(HstratError::IndexOutOfBounds {
            index: storage_end,
            len: bytes.len() * 8,
        });
    }

    let mut strata = lookup
        .lookup_ingest_times(buffer_size, num_ingests)?
        .into_iter()
        .enumerate()
        .filter_map(|(site, rank)| rank.map(|rank| (site, rank)))
        .map(|(site, rank)| {
            let offset = record.dstream_storage_bitoffset + site * bit_width as usize;
            let value = read_bits(&bytes, offset, bit_width as usize)?;
            Ok((rank, Differentia::new(value, bit_width)))
        })
        .collect::<Result<Vec<_>>>()?;
    strata.sort_unstable_by_key(|&(rank, _)| rank);
    let (ranks, differentia) = strata.into_iter().unzip();
    HereditaryStratigraphicSpecimen::new(ranks, differentia, num_ingests, bit_width)
}

/// Decode each record into a specimen, in order.
///
/// `extra` lookups take precedence over the built-in algorithms.
pub fn specimens_from_dstream_records(
    records: &[DstreamRecord],
    extra: &[&dyn DstreamLookup],
) -> Result<Vec<HereditaryStratigraphicSpecimen>> {
    records.iter().map(|record| decode_record(record, extra)).collect()
}

pub fn assemblage_from_dstream_records(
    records: &[DstreamRecord],
    extra: &[&dyn DstreamLookup],
) -> Result<HereditaryStratigraphicAssemblage> {
    HereditaryStratigraphicAssemblage::from_specimens(&specimens_from_dstream_records(records, extra)?)
}
