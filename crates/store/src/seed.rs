//! Demo data for a coffee shop loyalty program.

use crate::memory::MemoryBackend;
use chrono::{Duration, NaiveDate, Utc};
use rewards_core::phone::PhoneNumber;
use rewards_core::types::*;
use tracing::{info, warn};
use uuid::Uuid;

impl MemoryBackend {
    /// Populate the business row, a handful of customers with visit history,
    /// and the reward catalog.
    pub fn seed_demo_data(&self) {
        let now = Utc::now();

        let mut business = Business {
            name: "Coffee & Co.".to_string(),
            description: "Artisan coffee shop serving specialty coffee and pastries".to_string(),
            contact_email: Some("contact@coffeeandco.example".to_string()),
            contact_phone: Some("(555) 123-4567".to_string()),
            address: Some("123 Main Street, Downtown".to_string()),
            ..Business::default()
        };
        business.settings.welcome_message =
            "Welcome to Coffee & Co. Rewards! Earn points with every purchase and unlock exciting rewards."
                .to_string();
        *self.business_slot() = Some(business);

        // (first, last, phone, available, lifetime, visits, days since visit, days since signup, birthday)
        let customers: [(&str, &str, &str, u32, u64, u32, i64, i64, (i32, u32, u32)); 6] = [
            ("John", "Smith", "5551112222", 450, 1200, 24, 2, 460, (1985, 6, 15)),
            ("Emma", "Johnson", "5552223333", 180, 560, 12, 3, 250, (1990, 11, 22)),
            ("Michael", "Davis", "5553334444", 650, 1800, 36, 1, 520, (1978, 3, 4)),
            ("Sarah", "Wilson", "5554445555", 80, 380, 8, 45, 60, (1995, 8, 30)),
            ("Robert", "Taylor", "5557778888", 520, 1480, 30, 5, 400, (1982, 1, 9)),
            ("Amanda", "Clark", "5550001111", 140, 440, 9, 12, 20, (1993, 4, 18)),
        ];

        for (first, last, phone, available, lifetime, visits, since_visit, since_signup, bday) in
            customers
        {
            let Ok(phone) = PhoneNumber::parse(phone) else {
                warn!(phone, "Skipping seed customer with invalid phone");
                continue;
            };
            let id = Uuid::new_v4();
            let last_visit = now - Duration::days(since_visit);
            let customer = Customer {
                id,
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: Some(format!("{}.{}@example.com", first, last).to_lowercase()),
                phone,
                birth_date: NaiveDate::from_ymd_opt(bday.0, bday.1, bday.2),
                available_points: available,
                lifetime_points: lifetime,
                visit_count: visits,
                sms_opt_in: true,
                email_opt_in: since_signup % 2 == 0,
                last_visit_at: Some(last_visit),
                created_at: now - Duration::days(since_signup),
                updated_at: last_visit,
            };
            if let Err(e) = self.put_customer(customer) {
                warn!(error = %e, "Skipping duplicate seed customer");
                continue;
            }
            self.put_checkin(CheckIn {
                id: Uuid::new_v4(),
                customer_id: id,
                points: 10,
                created_at: last_visit,
            });
        }

        let rewards: [(&str, &str, u32, bool); 6] = [
            ("Free Coffee", "Redeem for a free coffee of your choice", 100, true),
            ("50% Off Pastry", "Get any pastry for half price", 75, true),
            ("Free Bakery Item", "Choose any bakery item for free", 150, true),
            ("Summer Special: Iced Drink", "Redeem for a free iced drink of your choice", 125, true),
            ("Buy One Get One Free", "Buy any drink and get one free", 200, true),
            ("Exclusive Coffee Tasting Event", "Access to our exclusive monthly coffee tasting event", 300, false),
        ];
        for (name, description, cost, active) in rewards {
            self.put_reward(Reward {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: description.to_string(),
                points_cost: cost,
                is_active: active,
                start_date: None,
                end_date: None,
                redemption_limit: None,
                current_redemptions: 0,
                requires_approval: false,
                created_at: now,
                updated_at: now,
            });
        }

        info!(customers = 6, rewards = 6, "Seeded demo data");
    }
}
