//! Stack resolution

use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{
    coupons::{Coupon, CouponCode},
    eligibility::RejectionReason,
    pricing,
};

/// A coupon admitted by the eligibility filter, tagged with how it entered
/// the stack.
///
/// Explicit candidates were typed in by the customer: when the resolver
/// excludes one, the exclusion is reported back. Automatic candidates are
/// dropped silently.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The admitted coupon.
    pub coupon: Coupon,

    /// Whether the customer entered this code explicitly.
    pub explicit: bool,
}

impl Candidate {
    /// An explicitly entered candidate.
    #[must_use]
    pub fn explicit(coupon: Coupon) -> Self {
        Self {
            coupon,
            explicit: true,
        }
    }

    /// An automatically considered candidate.
    #[must_use]
    pub fn automatic(coupon: Coupon) -> Self {
        Self {
            coupon,
            explicit: false,
        }
    }
}

/// Outcome of conflict resolution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Selected coupons in application order: priority descending, then code
    /// ascending.
    pub selected: Vec<Coupon>,

    /// Explicit candidates excluded by a conflict.
    pub conflicts: Vec<(CouponCode, RejectionReason)>,
}

/// Picks the maximal conflict-free subset of the admitted candidates.
///
/// The rules, applied greedily and deterministically:
///
/// 1. Coupons sharing a stack group are mutually exclusive; the best member
///    wins (priority, then larger standalone discount against the subtotal,
///    then lexicographically smallest code).
/// 2. A solo coupon (non-stackable, group-less) cannot combine with anything.
///    An explicit solo wins alone over the whole stack; an automatic solo is
///    chosen only when nothing else survives.
/// 3. Everything else — the best member of each group plus all stackable
///    group-less coupons — combines freely.
///
/// Greedy is optimal here: groups are exclusive by definition and stackable
/// coupons never conflict with each other, so there is no combination the
/// greedy choice forecloses.
#[must_use]
pub fn resolve(candidates: Vec<Candidate>, subtotal_cents: i64) -> Resolution {
    let mut grouped: FxHashMap<String, Vec<Candidate>> = FxHashMap::default();
    let mut solos: Vec<Candidate> = Vec::new();
    let mut stackables: Vec<Candidate> = Vec::new();

    for candidate in candidates {
        if let Some(group) = candidate.coupon.stack_group.clone() {
            grouped.entry(group).or_default().push(candidate);
        } else if candidate.coupon.is_solo() {
            solos.push(candidate);
        } else {
            stackables.push(candidate);
        }
    }

    let mut resolution = Resolution::default();

    // An explicit solo coupon preempts everything else.
    let explicit_solos: Vec<Candidate> = solos.iter().filter(|c| c.explicit).cloned().collect();

    if let Some(winner) = best_candidate(&explicit_solos, subtotal_cents) {
        for candidate in solos
            .iter()
            .chain(stackables.iter())
            .chain(grouped.values().flatten())
        {
            if candidate.coupon.id != winner.coupon.id {
                exclude(&mut resolution, candidate);
            }
        }

        resolution.selected.push(winner.coupon);

        return resolution;
    }

    for members in grouped.values() {
        let Some(winner) = best_candidate(members, subtotal_cents) else {
            continue;
        };

        for candidate in members {
            if candidate.coupon.id != winner.coupon.id {
                exclude(&mut resolution, candidate);
            }
        }

        resolution.selected.push(winner.coupon);
    }

    for candidate in stackables {
        resolution.selected.push(candidate.coupon);
    }

    if resolution.selected.is_empty()
        && let Some(winner) = best_candidate(&solos, subtotal_cents)
    {
        // Only automatic solos remain; the best one applies by itself.
        for candidate in &solos {
            if candidate.coupon.id != winner.coupon.id {
                exclude(&mut resolution, candidate);
            }
        }

        resolution.selected.push(winner.coupon);
    } else {
        for candidate in &solos {
            exclude(&mut resolution, candidate);
        }
    }

    resolution.selected.sort_by(application_order);

    resolution
}

/// Application order: priority descending, then code ascending.
fn application_order(a: &Coupon, b: &Coupon) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.code.cmp(&b.code))
}

/// Preference order within a conflict: priority, then standalone discount
/// value against the full subtotal, then lexicographically smallest code.
fn preference(a: &Coupon, b: &Coupon, subtotal_cents: i64) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| {
            pricing::deduction(a, subtotal_cents).cmp(&pricing::deduction(b, subtotal_cents))
        })
        .then_with(|| b.code.cmp(&a.code))
}

fn best_candidate(candidates: &[Candidate], subtotal_cents: i64) -> Option<Candidate> {
    let mut best: Option<&Candidate> = None;

    for candidate in candidates {
        match best {
            None => best = Some(candidate),
            Some(current) => {
                if preference(&candidate.coupon, &current.coupon, subtotal_cents)
                    == Ordering::Greater
                {
                    best = Some(candidate);
                }
            }
        }
    }

    best.cloned()
}

fn exclude(resolution: &mut Resolution, candidate: &Candidate) {
    if candidate.explicit {
        resolution
            .conflicts
            .push((candidate.coupon.code.clone(), RejectionReason::StackConflict));
    } else {
        debug!(code = %candidate.coupon.code, "dropping conflicting automatic coupon");
    }
}
