use crate::normalize::normalize;
use crate::order::compare_comunas;
use crate::types::BeneficiaryRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Display name for records with no neighborhood.
pub const SIN_BARRIO: &str = "Sin barrio";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarrioCount {
    pub barrio: String,
    pub count: u32,
}

/// Neighborhood counts for one district, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct DistrictCounts {
    barrios: Vec<BarrioCount>,
    // canonical key -> position in `barrios`
    index: HashMap<String, usize>,
}

impl DistrictCounts {
    fn record(&mut self, raw_barrio: &str) {
        let key = normalize(Some(raw_barrio));
        match self.index.get(&key) {
            Some(&pos) => self.barrios[pos].count += 1,
            None => {
                self.index.insert(key, self.barrios.len());
                self.barrios.push(BarrioCount {
                    barrio: raw_barrio.to_string(),
                    count: 1,
                });
            }
        }
    }

    pub fn barrios(&self) -> &[BarrioCount] {
        &self.barrios
    }

    pub fn total(&self) -> u32 {
        self.barrios.iter().map(|b| b.count).sum()
    }

    /// Count stored under an exact display name.
    pub fn get(&self, barrio: &str) -> Option<u32> {
        self.barrios.iter().find(|b| b.barrio == barrio).map(|b| b.count)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DistrictSummary<'a> {
    pub comuna: &'a str,
    pub total: u32,
    pub barrios: &'a [BarrioCount],
}

/// District -> neighborhood display name -> count.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    districts: HashMap<String, DistrictCounts>,
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.districts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.districts.len()
    }

    pub fn district(&self, comuna: &str) -> Option<&DistrictCounts> {
        self.districts.get(comuna)
    }

    pub fn get(&self, comuna: &str, barrio: &str) -> Option<u32> {
        self.district(comuna)?.get(barrio)
    }

    pub fn district_total(&self, comuna: &str) -> u32 {
        self.district(comuna).map_or(0, DistrictCounts::total)
    }

    pub fn total(&self) -> u32 {
        self.districts.values().map(DistrictCounts::total).sum()
    }

    /// Districts in display order; neighborhoods keep first-seen order.
    pub fn ordered(&self) -> Vec<DistrictSummary<'_>> {
        let mut summaries: Vec<DistrictSummary<'_>> = self
            .districts
            .iter()
            .map(|(comuna, counts)| DistrictSummary {
                comuna,
                total: counts.total(),
                barrios: counts.barrios(),
            })
            .collect();
        summaries.sort_by(|a, b| compare_comunas(a.comuna, b.comuna));
        summaries
    }
}

/// Groups records by district and canonical neighborhood key.
///
/// Records without a district are dropped, not bucketed. The display name
/// of a neighborhood is the first trimmed spelling seen for its key, so
/// the result depends on input order when spellings vary.
pub fn aggregate(records: &[BeneficiaryRecord]) -> Aggregation {
    let mut districts: HashMap<String, DistrictCounts> = HashMap::new();

    for record in records {
        let comuna = match record.comuna.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => c,
            _ => continue,
        };
        let barrio = match record.barrio.as_deref().map(str::trim) {
            Some(b) if !b.is_empty() => b,
            _ => SIN_BARRIO,
        };

        if let Some(counts) = districts.get_mut(comuna) {
            counts.record(barrio);
        } else {
            let mut counts = DistrictCounts::default();
            counts.record(barrio);
            districts.insert(comuna.to_string(), counts);
        }
    }

    Aggregation { districts }
}
