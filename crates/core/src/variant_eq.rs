//! Fuzzy value equality
//!
//! Diff and matching must agree on what "unchanged" means, otherwise the
//! matcher pairs nodes that diff then reports as different and every
//! refresh produces phantom changes. Both go through `variant_eq`.

use crate::variant::{Ref, Variant, Vector3};
use std::collections::BTreeSet;

const EPSILON: f64 = 0.0001;

/// Compare two possibly-absent property values
///
/// An absent value equals the null-reference sentinel.
pub fn variant_eq(a: Option<&Variant>, b: Option<&Variant>) -> bool {
    match (a, b) {
        (None, None) => true,
        (None, Some(value)) | (Some(value), None) => is_null_ref(value),
        (Some(a), Some(b)) => values_eq(a, b),
    }
}

/// Compare two present property values
pub fn values_eq(a: &Variant, b: &Variant) -> bool {
    if a == b {
        return true;
    }

    match (a, b) {
        (Variant::Attributes(a), Variant::Attributes(b)) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            keys.into_iter().all(|key| variant_eq(a.get(key), b.get(key)))
        }
        (Variant::EnumItem(item), other) | (other, Variant::EnumItem(item)) => {
            match other.as_number() {
                Some(number) => fuzzy_eq(item.value as f64, number),
                None => false,
            }
        }
        (Variant::Color3(a), Variant::Color3(b)) => a.to_rgb8() == b.to_rgb8(),
        (Variant::Vector2(a), Variant::Vector2(b)) => {
            fuzzy_eq_f32(a.x, b.x) && fuzzy_eq_f32(a.y, b.y)
        }
        (Variant::Vector3(a), Variant::Vector3(b)) => vector_eq(a, b),
        (Variant::CFrame(a), Variant::CFrame(b)) => {
            vector_eq(&a.position, &b.position)
                && a.orientation
                    .iter()
                    .zip(b.orientation.iter())
                    .all(|(a, b)| vector_eq(a, b))
        }
        (Variant::NumberRange(a), Variant::NumberRange(b)) => {
            fuzzy_eq_f32(a.min, b.min) && fuzzy_eq_f32(a.max, b.max)
        }
        (Variant::Tags(a), Variant::Tags(b)) => {
            let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
            let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
            a == b
        }
        (a, b) => match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => fuzzy_eq(a, b),
            _ => false,
        },
    }
}

fn is_null_ref(value: &Variant) -> bool {
    matches!(value, Variant::Ref(Ref::Null))
}

/// Absolute epsilon for small magnitudes, relative for large ones.
/// NaN equals NaN.
#[inline(always)]
fn fuzzy_eq(a: f64, b: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    let diff = (a - b).abs();
    let scale = a.abs().max(b.abs()).max(1.0);
    diff < EPSILON.max(EPSILON * scale)
}

#[inline(always)]
fn fuzzy_eq_f32(a: f32, b: f32) -> bool {
    fuzzy_eq(a as f64, b as f64)
}

#[inline(always)]
fn vector_eq(a: &Vector3, b: &Vector3) -> bool {
    fuzzy_eq_f32(a.x, b.x) && fuzzy_eq_f32(a.y, b.y) && fuzzy_eq_f32(a.z, b.z)
}
