//! # Trade Share Calculator
//!
//! Turns raw trade quantities into normalized shares with a cutoff-based
//! Rest-of-World aggregate.
//!
//! ## Cutoff rule
//!
//! Geographies are ranked by share, descending. The kept prefix runs up to
//! and including the first geography at which the cumulative share reaches
//! the cutoff (within [`SHARE_TOLERANCE`]); that boundary geography is kept
//! whole. Everything after it folds into `RoW`, merged with any `RoW` entry
//! already present. Kept shares are not rescaled, so with `RoW` added the
//! table sums to one.
//!
//! A `RoW` entry is always present, even at zero share: downstream passes
//! rely on a `RoW` producer as the fallback for unlisted partners.
//!
//! ## Consumption shares
//!
//! The cutoff applies twice. Importers are ranked by their share of total
//! consumption; importers past the cutoff are pooled into a `RoW` importer
//! whose partner quantities are summed. Then, within each importer, partners
//! are ranked and folded the same way. Each importer's partner shares sum
//! to one, with `RoW` inside the denominator.
//!
//! [`SHARE_TOLERANCE`]: regio_core::SHARE_TOLERANCE

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use regio_core::{CommodityId, Cutoff, Geography, Unit};

use crate::error::TradeError;
use crate::records::{ExportRecord, ImportRecord};

// ─── Share tables ────────────────────────────────────────────────────

/// One geography's share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareEntry {
    /// The geography.
    pub geography: Geography,
    /// Its normalized share.
    pub share: f64,
}

/// Normalized shares per geography. Named geographies come first in
/// descending order of share; `RoW` is last.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryShares {
    entries: Vec<ShareEntry>,
}

impl CountryShares {
    /// A table from precomputed shares. Named entries are ordered by
    /// descending share and a `RoW` entry is appended (at zero if absent).
    pub fn from_entries(entries: impl IntoIterator<Item = ShareEntry>) -> Self {
        let (rest, mut named): (Vec<ShareEntry>, Vec<ShareEntry>) = entries
            .into_iter()
            .partition(|e| e.geography == Geography::RestOfWorld);
        named.sort_by(|a, b| b.share.total_cmp(&a.share));
        named.push(ShareEntry {
            geography: Geography::RestOfWorld,
            share: rest.iter().map(|e| e.share).sum(),
        });
        Self { entries: named }
    }

    /// Share of `geography`, if listed.
    pub fn get(&self, geography: &Geography) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| &e.geography == geography)
            .map(|e| e.share)
    }

    /// Entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = &ShareEntry> {
        self.entries.iter()
    }

    /// Listed geographies in table order.
    pub fn geographies(&self) -> impl Iterator<Item = &Geography> {
        self.entries.iter().map(|e| &e.geography)
    }

    /// Share folded into `RoW`.
    pub fn rest_of_world(&self) -> f64 {
        self.get(&Geography::RestOfWorld).unwrap_or(0.0)
    }

    /// Sum of all shares.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.share).sum()
    }

    /// Number of listed geographies, `RoW` included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Export-side shares of one commodity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionShares {
    /// The commodity.
    pub commodity: CommodityId,
    /// The single unit its records use.
    pub unit: Unit,
    /// Exporter shares.
    pub exporters: CountryShares,
}

/// Consumption-side shares of one commodity, per importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionShares {
    /// The commodity.
    pub commodity: CommodityId,
    /// The single unit its records use.
    pub unit: Unit,
    /// Importer → partner shares. Includes a `RoW` importer.
    pub importers: BTreeMap<Geography, CountryShares>,
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// The one unit shared by all usable records, or the data-inconsistency error.
fn single_unit<'a>(
    commodity: &CommodityId,
    units: impl Iterator<Item = &'a Unit>,
) -> Result<Unit, TradeError> {
    let distinct: BTreeSet<&Unit> = units.collect();
    let mut iter = distinct.into_iter();
    match (iter.next(), iter.next()) {
        (None, _) => Err(TradeError::NoTradeData {
            commodity: commodity.clone(),
        }),
        (Some(unit), None) => Ok(unit.clone()),
        (Some(first), Some(second)) => {
            let mut units = vec![first.clone(), second.clone()];
            units.extend(iter.cloned());
            Err(TradeError::MixedUnits {
                commodity: commodity.clone(),
                units,
            })
        }
    }
}

/// Sum rows per `(key, year)`, then average over the years each key reported.
fn average_over_years<K: Ord + Clone>(rows: impl Iterator<Item = (K, u16, f64)>) -> BTreeMap<K, f64> {
    let mut per_year: BTreeMap<(K, u16), f64> = BTreeMap::new();
    for (key, year, quantity) in rows {
        *per_year.entry((key, year)).or_default() += quantity;
    }
    let mut sums: BTreeMap<K, (f64, u32)> = BTreeMap::new();
    for ((key, _), quantity) in per_year {
        let slot = sums.entry(key).or_default();
        slot.0 += quantity;
        slot.1 += 1;
    }
    sums.into_iter()
        .map(|(key, (sum, years))| (key, sum / f64::from(years)))
        .collect()
}

/// Normalize quantities to shares and rank them descending. Ties keep
/// geography order.
fn rank(quantities: &BTreeMap<Geography, f64>) -> Vec<ShareEntry> {
    let total: f64 = quantities.values().sum();
    let mut ranked: Vec<ShareEntry> = quantities
        .iter()
        .map(|(geography, q)| ShareEntry {
            geography: geography.clone(),
            share: if total > 0.0 { q / total } else { 0.0 },
        })
        .collect();
    ranked.sort_by(|a, b| b.share.total_cmp(&a.share));
    ranked
}

/// Split a ranked list into the kept prefix and the folded remainder.
fn split_at_cutoff(ranked: Vec<ShareEntry>, cutoff: Cutoff) -> (Vec<ShareEntry>, Vec<ShareEntry>) {
    let mut kept = Vec::new();
    let mut cumulative = 0.0;
    let mut rest = ranked.into_iter();
    for entry in rest.by_ref() {
        cumulative += entry.share;
        kept.push(entry);
        if cutoff.is_reached_by(cumulative) {
            break;
        }
    }
    (kept, rest.collect())
}

/// Apply the cutoff and fold the remainder into a trailing `RoW` entry.
fn fold_into_rest_of_world(ranked: Vec<ShareEntry>, cutoff: Cutoff) -> CountryShares {
    let (mut kept, rest) = split_at_cutoff(ranked, cutoff);
    let remainder: f64 = rest.iter().map(|e| e.share).sum();
    let position = kept
        .iter()
        .position(|e| e.geography == Geography::RestOfWorld);
    let existing = position.map(|pos| kept.remove(pos).share).unwrap_or(0.0);
    kept.push(ShareEntry {
        geography: Geography::RestOfWorld,
        share: existing + remainder,
    });
    CountryShares { entries: kept }
}

// ─── Calculator ──────────────────────────────────────────────────────

/// Computes production and consumption shares under one cutoff.
#[derive(Debug, Clone, Copy)]
pub struct TradeShareCalculator {
    cutoff: Cutoff,
}

impl TradeShareCalculator {
    /// A calculator for a raw cutoff value.
    pub fn new(cutoff: f64) -> Result<Self, TradeError> {
        Cutoff::new(cutoff)
            .map(Self::with_cutoff)
            .map_err(|_| TradeError::InvalidCutoff(cutoff))
    }

    /// A calculator for a validated cutoff.
    pub fn with_cutoff(cutoff: Cutoff) -> Self {
        Self { cutoff }
    }

    /// The cutoff in use.
    pub fn cutoff(&self) -> Cutoff {
        self.cutoff
    }

    /// Exporter shares of one commodity.
    pub fn production_shares(
        &self,
        commodity: &CommodityId,
        records: &[ExportRecord],
    ) -> Result<ProductionShares, TradeError> {
        let usable: Vec<(&ExportRecord, &Geography, f64)> = records
            .iter()
            .filter_map(|r| Some((r, r.exporter.geography()?, r.effective_quantity()?)))
            .collect();
        let unit = single_unit(commodity, usable.iter().map(|(r, _, _)| &r.unit))?;

        let means = average_over_years(
            usable
                .iter()
                .map(|(r, geography, q)| ((*geography).clone(), r.year, *q)),
        );
        let exporters = fold_into_rest_of_world(rank(&means), self.cutoff);

        tracing::debug!(
            commodity = %commodity,
            exporters = exporters.len() - 1,
            rest_of_world = exporters.rest_of_world(),
            "computed production shares"
        );
        Ok(ProductionShares {
            commodity: commodity.clone(),
            unit,
            exporters,
        })
    }

    /// Importer × partner shares of one commodity. `records` should already
    /// include domestic-production rows.
    pub fn consumption_shares(
        &self,
        commodity: &CommodityId,
        records: &[ImportRecord],
    ) -> Result<ConsumptionShares, TradeError> {
        let usable: Vec<(&ImportRecord, &Geography, &Geography, f64)> = records
            .iter()
            .filter_map(|r| {
                Some((
                    r,
                    r.importer.geography()?,
                    r.partner.geography()?,
                    r.effective_quantity()?,
                ))
            })
            .collect();
        let unit = single_unit(commodity, usable.iter().map(|(r, _, _, _)| &r.unit))?;

        let means = average_over_years(usable.iter().map(|(r, importer, partner, q)| {
            (((*importer).clone(), (*partner).clone()), r.year, *q)
        }));

        let mut by_importer: BTreeMap<Geography, BTreeMap<Geography, f64>> = BTreeMap::new();
        for ((importer, partner), q) in &means {
            *by_importer
                .entry(importer.clone())
                .or_default()
                .entry(partner.clone())
                .or_default() += q;
        }

        // Importer-level cutoff.
        let importer_totals: BTreeMap<Geography, f64> = by_importer
            .iter()
            .map(|(importer, partners)| (importer.clone(), partners.values().sum()))
            .collect();
        let (kept, rest) = split_at_cutoff(rank(&importer_totals), self.cutoff);

        // An existing RoW importer merges into the pool once, whether or
        // not it fell below the cutoff.
        let rest_of_world = Geography::RestOfWorld;
        let mut pooled: BTreeMap<Geography, f64> = BTreeMap::new();
        let pool_names: BTreeSet<&Geography> = rest
            .iter()
            .map(|e| &e.geography)
            .chain(std::iter::once(&rest_of_world))
            .collect();
        for importer in pool_names {
            if let Some(partners) = by_importer.get(importer) {
                for (partner, q) in partners {
                    *pooled.entry(partner.clone()).or_default() += q;
                }
            }
        }
        if pooled.values().sum::<f64>() <= 0.0 {
            // Every importer was kept: RoW consumers buy the global mix.
            for partners in by_importer.values() {
                for (partner, q) in partners {
                    *pooled.entry(partner.clone()).or_default() += q;
                }
            }
        }

        let mut importers = BTreeMap::new();
        for entry in kept {
            if entry.geography == Geography::RestOfWorld {
                continue;
            }
            if let Some(partners) = by_importer.get(&entry.geography) {
                importers.insert(
                    entry.geography.clone(),
                    fold_into_rest_of_world(rank(partners), self.cutoff),
                );
            }
        }
        importers.insert(
            Geography::RestOfWorld,
            fold_into_rest_of_world(rank(&pooled), self.cutoff),
        );

        tracing::debug!(
            commodity = %commodity,
            importers = importers.len(),
            "computed consumption shares"
        );
        Ok(ConsumptionShares {
            commodity: commodity.clone(),
            unit,
            importers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TradeLocation;
    use regio_core::HsCode;

    fn commodity() -> CommodityId {
        CommodityId::new("steel, low-alloyed").unwrap()
    }

    fn export(exporter: &str, year: u16, q: f64) -> ExportRecord {
        ExportRecord {
            hs: HsCode::new("7207").unwrap(),
            year,
            exporter: TradeLocation::parse(exporter).unwrap(),
            quantity: Some(q),
            alt_quantity: None,
            unit: Unit::new("tonne").unwrap(),
        }
    }

    fn import(importer: &str, partner: &str, q: f64) -> ImportRecord {
        ImportRecord {
            hs: HsCode::new("7207").unwrap(),
            year: 2021,
            importer: TradeLocation::parse(importer).unwrap(),
            partner: TradeLocation::parse(partner).unwrap(),
            quantity: Some(q),
            alt_quantity: None,
            unit: Unit::new("tonne").unwrap(),
        }
    }

    fn calc(cutoff: f64) -> TradeShareCalculator {
        TradeShareCalculator::new(cutoff).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // ── Production ────────────────────────────────────────────────────

    #[test]
    fn test_production_boundary_kept_whole() {
        // A=0.5, B=0.3, C=0.2 with cutoff 0.8: A+B reaches the cutoff exactly.
        let records = [export("AT", 2021, 50.0), export("BE", 2021, 30.0), export("CZ", 2021, 20.0)];
        let shares = calc(0.8).production_shares(&commodity(), &records).unwrap().exporters;
        assert!(close(shares.get(&Geography::country("AT")).unwrap(), 0.5));
        assert!(close(shares.get(&Geography::country("BE")).unwrap(), 0.3));
        assert!(close(shares.rest_of_world(), 0.2));
        assert_eq!(shares.get(&Geography::country("CZ")), None);
        assert!(close(shares.total(), 1.0));
    }

    #[test]
    fn test_production_rest_of_world_is_last() {
        let records = [export("AT", 2021, 50.0), export("BE", 2021, 30.0), export("CZ", 2021, 20.0)];
        let shares = calc(0.6).production_shares(&commodity(), &records).unwrap().exporters;
        let order: Vec<&Geography> = shares.geographies().collect();
        assert_eq!(
            order,
            vec![&Geography::country("AT"), &Geography::country("BE"), &Geography::RestOfWorld]
        );
    }

    #[test]
    fn test_production_full_cutoff_keeps_zero_row() {
        let records = [export("AT", 2021, 1.0), export("BE", 2021, 1.0)];
        let shares = calc(1.0).production_shares(&commodity(), &records).unwrap().exporters;
        assert_eq!(shares.len(), 3);
        assert_eq!(shares.rest_of_world(), 0.0);
    }

    #[test]
    fn test_production_merges_existing_rest_of_world() {
        let records = [export("AT", 2021, 60.0), export("RoW", 2021, 30.0), export("CZ", 2021, 10.0)];
        let shares = calc(0.9).production_shares(&commodity(), &records).unwrap().exporters;
        assert!(close(shares.rest_of_world(), 0.4));
        assert_eq!(shares.geographies().filter(|g| **g == Geography::RestOfWorld).count(), 1);
    }

    #[test]
    fn test_production_averages_reported_years() {
        // AT reports 10 and 30 (mean 20); BE reports 20 once.
        let records = [
            export("AT", 2020, 10.0),
            export("AT", 2021, 30.0),
            export("BE", 2021, 20.0),
            export("BE", 2020, 0.0),
        ];
        let shares = calc(1.0).production_shares(&commodity(), &records).unwrap().exporters;
        assert!(close(shares.get(&Geography::country("AT")).unwrap(), 0.5));
        assert!(close(shares.get(&Geography::country("BE")).unwrap(), 0.5));
    }

    #[test]
    fn test_production_uses_alternate_quantity() {
        let mut alt = export("BE", 2021, 0.0);
        alt.alt_quantity = Some(50.0);
        let records = [export("AT", 2021, 50.0), alt];
        let shares = calc(1.0).production_shares(&commodity(), &records).unwrap().exporters;
        assert!(close(shares.get(&Geography::country("BE")).unwrap(), 0.5));
    }

    #[test]
    fn test_production_ignores_world_total() {
        let records = [export("AT", 2021, 50.0), export("W00", 2021, 1000.0)];
        let shares = calc(1.0).production_shares(&commodity(), &records).unwrap().exporters;
        assert!(close(shares.get(&Geography::country("AT")).unwrap(), 1.0));
    }

    #[test]
    fn test_mixed_units_rejected() {
        let mut other = export("BE", 2021, 5.0);
        other.unit = Unit::new("cubic meter").unwrap();
        let records = [export("AT", 2021, 5.0), other];
        assert!(matches!(
            calc(0.9).production_shares(&commodity(), &records),
            Err(TradeError::MixedUnits { .. })
        ));
    }

    #[test]
    fn test_zero_records_do_not_count_for_units() {
        let mut other = export("BE", 2021, 0.0);
        other.unit = Unit::new("cubic meter").unwrap();
        let records = [export("AT", 2021, 5.0), other];
        assert!(calc(0.9).production_shares(&commodity(), &records).is_ok());
    }

    #[test]
    fn test_no_data() {
        assert!(matches!(
            calc(0.9).production_shares(&commodity(), &[export("AT", 2021, 0.0)]),
            Err(TradeError::NoTradeData { .. })
        ));
    }

    #[test]
    fn test_invalid_cutoff() {
        assert!(matches!(TradeShareCalculator::new(0.0), Err(TradeError::InvalidCutoff(_))));
        assert!(TradeShareCalculator::new(1.2).is_err());
    }

    // ── Consumption ───────────────────────────────────────────────────

    #[test]
    fn test_consumption_partner_fold_includes_row_in_denominator() {
        // D=0.6, E=0.25, F=0.15 with cutoff 0.8.
        let records = [import("FR", "DE", 60.0), import("FR", "ES", 25.0), import("FR", "FI", 15.0)];
        let shares = calc(0.8).consumption_shares(&commodity(), &records).unwrap();
        let fr = &shares.importers[&Geography::country("FR")];
        assert!(close(fr.get(&Geography::country("DE")).unwrap(), 0.6));
        assert!(close(fr.get(&Geography::country("ES")).unwrap(), 0.25));
        assert!(close(fr.rest_of_world(), 0.15));
        assert!(close(fr.total(), 1.0));
    }

    #[test]
    fn test_consumption_pools_small_importers() {
        let records = [
            import("FR", "DE", 80.0),
            import("IT", "DE", 10.0),
            import("IT", "CN", 5.0),
            import("PT", "ES", 5.0),
        ];
        let shares = calc(0.8).consumption_shares(&commodity(), &records).unwrap();
        assert!(shares.importers.contains_key(&Geography::country("FR")));
        assert!(!shares.importers.contains_key(&Geography::country("IT")));
        let row = &shares.importers[&Geography::RestOfWorld];
        // Pooled partners: DE 10, CN 5, ES 5.
        assert!(close(row.get(&Geography::country("DE")).unwrap(), 0.5));
        assert!(close(row.total(), 1.0));
    }

    #[test]
    fn test_consumption_pooled_rest_of_world_importer_counted_once() {
        let records = [
            import("FR", "DE", 70.0),
            import("RoW", "CN", 10.0),
            import("RoW", "US", 10.0),
            import("JP", "KR", 10.0),
        ];
        let shares = calc(0.7).consumption_shares(&commodity(), &records).unwrap();
        assert!(shares.importers.contains_key(&Geography::country("FR")));
        assert!(!shares.importers.contains_key(&Geography::country("JP")));
        let row = &shares.importers[&Geography::RestOfWorld];
        // Pooled partners: CN 10, US 10, KR 10.
        for partner in ["CN", "US", "KR"] {
            assert!(close(row.get(&Geography::country(partner)).unwrap(), 1.0 / 3.0));
        }
        assert!(close(row.total(), 1.0));
    }

    #[test]
    fn test_consumption_rest_of_world_falls_back_to_global_mix() {
        let records = [import("FR", "DE", 30.0), import("IT", "DE", 10.0)];
        let shares = calc(1.0).consumption_shares(&commodity(), &records).unwrap();
        let row = &shares.importers[&Geography::RestOfWorld];
        assert!(close(row.get(&Geography::country("DE")).unwrap(), 1.0));
    }

    #[test]
    fn test_consumption_includes_domestic_rows() {
        let records = [import("FR", "FR", 50.0), import("FR", "DE", 50.0)];
        let shares = calc(1.0).consumption_shares(&commodity(), &records).unwrap();
        let fr = &shares.importers[&Geography::country("FR")];
        assert!(close(fr.get(&Geography::country("FR")).unwrap(), 0.5));
    }

    #[test]
    fn test_consumption_excludes_world_total_partner() {
        let records = [import("FR", "DE", 10.0), import("FR", "WLD", 500.0)];
        let shares = calc(1.0).consumption_shares(&commodity(), &records).unwrap();
        let fr = &shares.importers[&Geography::country("FR")];
        assert!(close(fr.get(&Geography::country("DE")).unwrap(), 1.0));
    }

    #[test]
    fn test_from_entries_orders_and_appends_row() {
        let entry = |code: &str, share: f64| ShareEntry {
            geography: Geography::parse(code).unwrap(),
            share,
        };
        let shares = CountryShares::from_entries([entry("JP", 0.2), entry("DE", 0.8)]);
        let order: Vec<&str> = shares.geographies().map(Geography::as_str).collect();
        assert_eq!(order, ["DE", "JP", "RoW"]);
        assert_eq!(shares.rest_of_world(), 0.0);
    }
}
