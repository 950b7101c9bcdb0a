//! Customer segment rules.

use crate::models::SegmentRule;
use chrono::{DateTime, Datelike, Duration, Utc};
use rewards_core::types::Customer;

impl SegmentRule {
    /// Whether `customer` belongs to the segment at `now`.
    pub fn matches(&self, customer: &Customer, now: DateTime<Utc>) -> bool {
        match *self {
            SegmentRule::AllActive => true,
            SegmentRule::MinPoints { points } => customer.available_points >= points,
            SegmentRule::RegisteredWithinDays { days } => {
                customer.created_at >= now - Duration::days(days)
            }
            // Customers who never visited are not at risk, just new.
            SegmentRule::LastVisitOlderThanDays { days } => customer
                .last_visit_at
                .is_some_and(|at| at < now - Duration::days(days)),
            SegmentRule::BirthdayThisMonth => customer
                .birth_date
                .is_some_and(|d| d.month() == now.month()),
        }
    }

    pub fn count(&self, customers: &[Customer], now: DateTime<Utc>) -> u64 {
        customers.iter().filter(|c| self.matches(c, now)).count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rewards_core::phone::PhoneNumber;
    use uuid::Uuid;

    fn customer(points: u32, created_days_ago: i64, visit_days_ago: Option<i64>) -> Customer {
        let now = Utc::now();
        Customer {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: String::new(),
            phone: PhoneNumber::parse("5558675309").unwrap(),
            email: None,
            birth_date: None,
            available_points: points,
            lifetime_points: points as u64,
            visit_count: 1,
            sms_opt_in: true,
            email_opt_in: false,
            last_visit_at: visit_days_ago.map(|d| now - Duration::days(d)),
            created_at: now - Duration::days(created_days_ago),
            updated_at: now,
        }
    }

    #[test]
    fn test_min_points() {
        let now = Utc::now();
        let rule = SegmentRule::MinPoints { points: 400 };
        assert!(rule.matches(&customer(400, 10, Some(1)), now));
        assert!(!rule.matches(&customer(399, 10, Some(1)), now));
    }

    #[test]
    fn test_registered_within_days() {
        let now = Utc::now();
        let rule = SegmentRule::RegisteredWithinDays { days: 90 };
        assert!(rule.matches(&customer(0, 20, None), now));
        assert!(!rule.matches(&customer(0, 200, None), now));
    }

    #[test]
    fn test_at_risk() {
        let now = Utc::now();
        let rule = SegmentRule::LastVisitOlderThanDays { days: 30 };
        assert!(rule.matches(&customer(0, 100, Some(45)), now));
        assert!(!rule.matches(&customer(0, 100, Some(3)), now));
        assert!(!rule.matches(&customer(0, 100, None), now));
    }

    #[test]
    fn test_birthday_this_month() {
        let now = Utc::now();
        let mut c = customer(0, 10, None);
        c.birth_date = NaiveDate::from_ymd_opt(1990, now.month(), 1);
        assert!(SegmentRule::BirthdayThisMonth.matches(&c, now));

        let other_month = now.month() % 12 + 1;
        c.birth_date = NaiveDate::from_ymd_opt(1990, other_month, 1);
        assert!(!SegmentRule::BirthdayThisMonth.matches(&c, now));
    }

    #[test]
    fn test_count() {
        let now = Utc::now();
        let customers = vec![customer(500, 10, Some(1)), customer(50, 10, Some(1))];
        assert_eq!(SegmentRule::AllActive.count(&customers, now), 2);
        assert_eq!(SegmentRule::MinPoints { points: 400 }.count(&customers, now), 1);
    }
}
