use std::ops::{Add, AddAssign};

/// Per-component breakdown of a restraint energy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RestraintTerm {
    pub bond: f64,
    pub angle: f64,
    pub clash: f64,
}

impl RestraintTerm {
    pub fn new(bond: f64, angle: f64, clash: f64) -> Self {
        Self { bond, angle, clash }
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.bond + self.angle + self.clash
    }

    pub fn is_finite(&self) -> bool {
        self.total().is_finite()
    }
}

impl Add for RestraintTerm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            bond: self.bond + rhs.bond,
            angle: self.angle + rhs.angle,
            clash: self.clash + rhs.clash,
        }
    }
}

impl AddAssign for RestraintTerm {
    fn add_assign(&mut self, rhs: Self) {
        self.bond += rhs.bond;
        self.angle += rhs.angle;
        self.clash += rhs.clash;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_returns_sum_of_all_terms() {
        let term = RestraintTerm::new(1.5, 2.0, 0.5);
        assert_eq!(term.total(), 4.0);
    }

    #[test]
    fn add_and_add_assign_sum_each_field() {
        let a = RestraintTerm::new(1.0, 2.0, 3.0);
        let b = RestraintTerm::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, RestraintTerm::new(5.0, 7.0, 9.0));

        let mut c = a;
        c += b;
        assert_eq!(c, RestraintTerm::new(5.0, 7.0, 9.0));
    }

    #[test]
    fn nan_component_makes_term_non_finite() {
        assert!(RestraintTerm::default().is_finite());
        assert!(!RestraintTerm::new(f64::NAN, 0.0, 0.0).is_finite());
        assert!(!RestraintTerm::new(0.0, 0.0, f64::INFINITY).is_finite());
    }
}
