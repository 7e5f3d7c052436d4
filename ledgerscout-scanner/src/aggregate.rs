//! Ranking of the records collected during one or more runs.

use crate::result::ResultRecord;
use std::collections::HashMap;

/// Collapse duplicate URLs to their best-scoring record and rank the rest.
///
/// Ordering is score descending, then PDFs before pages, then first-seen order.
/// `top_n == 0` keeps every record.
pub fn aggregate(records: &[ResultRecord], top_n: usize) -> Vec<ResultRecord> {
    let mut best: HashMap<&str, usize> = HashMap::new();
    let mut ranked: Vec<(usize, ResultRecord)> = Vec::new();

    for record in records {
        match best.get(record.url.as_str()) {
            Some(&slot) => {
                let (_, current) = &ranked[slot];
                if record.score > current.score {
                    ranked[slot].1 = record.clone();
                }
            }
            None => {
                best.insert(record.url.as_str(), ranked.len());
                ranked.push((ranked.len(), record.clone()));
            }
        }
    }

    ranked.sort_by(|(a_order, a), (b_order, b)| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.is_pdf.cmp(&a.is_pdf))
            .then_with(|| a_order.cmp(b_order))
    });

    let mut out: Vec<ResultRecord> = ranked.into_iter().map(|(_, r)| r).collect();
    if top_n > 0 {
        out.truncate(top_n);
    }
    out
}
