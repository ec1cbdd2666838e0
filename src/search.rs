// Free-text search ranking over record id and name

use crate::record::Record;

/// How a record matched the query, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    ExactId, // id == query
    ExactName, // name == query
    IdPrefix, // id starts with query
    NamePrefix, // name starts with query
    IdContains, // id contains query
    NameContains, // name contains query
}

impl MatchKind {
    /// Ranking score; higher sorts first
    pub fn score(self) -> u8 {
        match self {
            MatchKind::ExactId => 100,
            MatchKind::ExactName => 90,
            MatchKind::IdPrefix => 80,
            MatchKind::NamePrefix => 70,
            MatchKind::IdContains => 60,
            MatchKind::NameContains => 50,
        }
    }

    /// Classify a record against an already lowercased, trimmed query
    fn classify(record: &Record, query: &str) -> Option<Self> {
        let id = record.id.to_lowercase();
        let name = record.name.to_lowercase();

        if id == query {
            Some(MatchKind::ExactId)
        } else if name == query {
            Some(MatchKind::ExactName)
        } else if id.starts_with(query) {
            Some(MatchKind::IdPrefix)
        } else if name.starts_with(query) {
            Some(MatchKind::NamePrefix)
        } else if id.contains(query) {
            Some(MatchKind::IdContains)
        } else if name.contains(query) {
            Some(MatchKind::NameContains)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::ExactId => write!(f, "exact id"),
            MatchKind::ExactName => write!(f, "exact name"),
            MatchKind::IdPrefix => write!(f, "id prefix"),
            MatchKind::NamePrefix => write!(f, "name prefix"),
            MatchKind::IdContains => write!(f, "id contains"),
            MatchKind::NameContains => write!(f, "name contains"),
        }
    }
}

/// Positions of matching records with their match kind, best first.
///
/// `None` means the query was empty and no filtering applies.
fn ranked_positions(records: &[Record], query: &str) -> Option<Vec<(MatchKind, usize)>> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    let mut hits: Vec<(MatchKind, usize)> = records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| MatchKind::classify(r, &query).map(|kind| (kind, i)))
        .collect();

    // sort_by is stable, so equal scores keep input order
    hits.sort_by(|a, b| b.0.score().cmp(&a.0.score()));
    Some(hits)
}

/// Rank records against `query`, keeping the match kind alongside each hit.
///
/// Returns `None` for an empty or whitespace-only query, meaning "no
/// filtering". Otherwise only matching records are returned, strongest match
/// first; ties keep their input order.
pub fn rank_scored<'a>(records: &'a [Record], query: &str) -> Option<Vec<(MatchKind, &'a Record)>> {
    ranked_positions(records, query).map(|hits| hits.into_iter().map(|(kind, i)| (kind, &records[i])).collect())
}

/// Filter and order records for display.
///
/// An empty query returns the full list unchanged.
pub fn rank(records: Vec<Record>, query: &str) -> Vec<Record> {
    let Some(hits) = ranked_positions(&records, query) else {
        return records;
    };

    let mut slots: Vec<Option<Record>> = records.into_iter().map(Some).collect();
    hits.into_iter().filter_map(|(_, i)| slots[i].take()).collect()
}
