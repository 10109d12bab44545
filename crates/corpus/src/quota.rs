//! Proportional quota allocation across weighted categories.
//!
//! Every category gets at least one paper. When `categories > total` the
//! floor of one per category wins over the total, so the sum can exceed the
//! target; `plan_fetch` is what keeps the executed plan within bounds.

use scholar_config::CategoryConfig;
use scholar_core::error::{Error, Result};
use serde::Serialize;

/// A category and the number of papers allotted to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTarget {
    pub category_id: String,
    pub weight: f64,
    pub quota: usize,
}

/// Split `total` papers across `categories` in proportion to their weights.
///
/// Output is in input order. Fails with a configuration error when the list
/// is empty or any weight is not a positive finite number.
pub fn allocate_quotas(categories: &[CategoryConfig], total: usize) -> Result<Vec<CategoryTarget>> {
    if categories.is_empty() {
        return Err(Error::config("corpus.categories must not be empty"));
    }
    if let Some(bad) = categories
        .iter()
        .find(|c| !(c.weight.is_finite() && c.weight > 0.0))
    {
        return Err(Error::config(format!(
            "category '{}' has non-positive weight {}",
            bad.id, bad.weight
        )));
    }

    let total_weight: f64 = categories.iter().map(|c| c.weight).sum();
    let n = total as f64;

    let mut quotas: Vec<usize> = categories
        .iter()
        .map(|c| ((n * c.weight / total_weight).floor() as usize).max(1))
        .collect();
    let mut sum: usize = quotas.iter().sum();

    if sum > total {
        let factor = n / sum as f64;
        for q in quotas.iter_mut() {
            *q = ((*q as f64 * factor).floor() as usize).max(1);
        }
        sum = quotas.iter().sum();
    }

    // Largest weight first; the first occurrence wins ties
    if sum < total {
        let heaviest = index_of_max_weight(categories);
        quotas[heaviest] += total - sum;
        sum = total;
    }

    while sum > total {
        let Some(lightest) = index_of_min_weight_quota(categories, &quotas) else {
            break;
        };
        quotas[lightest] -= 1;
        sum -= 1;
    }

    Ok(categories
        .iter()
        .zip(quotas)
        .map(|(c, quota)| CategoryTarget {
            category_id: c.id.clone(),
            weight: c.weight,
            quota,
        })
        .collect())
}

fn index_of_max_weight(categories: &[CategoryConfig]) -> usize {
    let mut best = 0;
    for (i, c) in categories.iter().enumerate().skip(1) {
        if c.weight > categories[best].weight {
            best = i;
        }
    }
    best
}

/// Smallest `(weight, quota)` among categories that can still give one up.
fn index_of_min_weight_quota(categories: &[CategoryConfig], quotas: &[usize]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for i in (0..categories.len()).filter(|&i| quotas[i] > 1) {
        let better = match best {
            None => true,
            Some(b) => {
                let (w, q) = (categories[i].weight, quotas[i]);
                let (bw, bq) = (categories[b].weight, quotas[b]);
                w < bw || (w == bw && q < bq)
            }
        };
        if better {
            best = Some(i);
        }
    }
    best
}

/// Clamp each quota to what remains of `max_total`, in category order.
///
/// Categories reached after the budget is spent get a quota of zero.
pub fn plan_fetch(targets: &[CategoryTarget], max_total: usize) -> Vec<CategoryTarget> {
    let mut remaining = max_total;
    targets
        .iter()
        .map(|t| {
            let quota = t.quota.min(remaining);
            remaining -= quota;
            CategoryTarget {
                quota,
                ..t.clone()
            }
        })
        .collect()
}

/// First publication year kept when collecting the last `recent_years` years.
pub fn cutoff_year(current_year: i32, recent_years: u32) -> i32 {
    current_year - recent_years as i32 + 1
}
