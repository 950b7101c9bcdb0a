//! Dashboard reports over a trailing period.

use crate::models::{DailyCount, Report, ReportPeriod};
use chrono::{DateTime, Days, Months, NaiveDate, NaiveTime, Utc};
use rewards_core::error::RewardsResult;
use rewards_core::types::TimeRange;
use rewards_core::RewardsBackend;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const TOP_REWARDS: usize = 3;

impl ReportPeriod {
    /// Whole days from the first day of the period through `now`.
    pub fn range(self, now: DateTime<Utc>) -> TimeRange {
        let today = now.date_naive();
        let first_day = match self {
            ReportPeriod::Last7Days => today.checked_sub_days(Days::new(6)),
            ReportPeriod::Last30Days => today.checked_sub_days(Days::new(29)),
            ReportPeriod::Last90Days => today.checked_sub_days(Days::new(89)),
            ReportPeriod::LastYear => today.checked_sub_months(Months::new(12)),
        }
        .unwrap_or(NaiveDate::MIN);
        TimeRange {
            start: first_day.and_time(NaiveTime::MIN).and_utc(),
            end: now,
        }
    }
}

/// Zero-filled per-day series between the range's first and last day.
fn daily_series(range: &TimeRange, counts: &BTreeMap<NaiveDate, u64>) -> Vec<DailyCount> {
    range
        .start
        .date_naive()
        .iter_days()
        .take_while(|d| *d <= range.end.date_naive())
        .map(|date| DailyCount {
            date,
            count: counts.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

pub async fn build_report(
    backend: &dyn RewardsBackend,
    period: ReportPeriod,
    now: DateTime<Utc>,
) -> RewardsResult<Report> {
    let range = period.range(now);

    let checkins = backend.list_checkins(Some(range)).await?;
    let customers = backend.list_customers().await?;
    let redemptions = backend.list_redemptions(Some(range)).await?;
    let rewards = backend.list_rewards().await?;

    let mut visits_per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    let mut points_per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    let mut visits_per_customer: HashMap<uuid::Uuid, u64> = HashMap::new();
    for checkin in &checkins {
        let day = checkin.created_at.date_naive();
        *visits_per_day.entry(day).or_default() += 1;
        *points_per_day.entry(day).or_default() += checkin.points as u64;
        *visits_per_customer.entry(checkin.customer_id).or_default() += 1;
    }

    let mut redemptions_per_reward: HashMap<uuid::Uuid, u64> = HashMap::new();
    for redemption in &redemptions {
        *redemptions_per_reward.entry(redemption.reward_id).or_default() += 1;
    }
    // Ties go to the reward whose name sorts first.
    let most_popular_reward = redemptions_per_reward
        .iter()
        .max_by(|(a_id, a), (b_id, b)| {
            a.cmp(b).then_with(|| {
                let name = |id: &uuid::Uuid| rewards.iter().find(|r| r.id == *id).map(|r| r.name.as_str());
                name(b_id).cmp(&name(a_id))
            })
        })
        .map(|(id, _)| {
            rewards
                .iter()
                .find(|r| r.id == *id)
                .map(|r| r.name.clone())
                .unwrap_or_else(|| "Unknown".to_string())
        });

    let mut top_rewards = rewards.clone();
    top_rewards.sort_by(|a, b| b.current_redemptions.cmp(&a.current_redemptions));
    top_rewards.truncate(TOP_REWARDS);

    let report = Report {
        period,
        start: range.start,
        end: range.end,
        total_visits: checkins.len() as u64,
        daily_visits: daily_series(&range, &visits_per_day),
        daily_points: daily_series(&range, &points_per_day),
        points_issued: customers.iter().map(|c| c.lifetime_points).sum(),
        new_customers: customers.iter().filter(|c| range.contains(c.created_at)).count() as u64,
        returning_customers: visits_per_customer.values().filter(|n| **n >= 2).count() as u64,
        total_redemptions: redemptions.len() as u64,
        most_popular_reward,
        top_rewards,
    };
    debug!(period = ?period, visits = report.total_visits, "Report built");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rewards_core::types::{CheckIn, Redemption};
    use rewards_store::MemoryBackend;
    use uuid::Uuid;

    #[test]
    fn test_period_ranges_cover_whole_days() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
        let range = ReportPeriod::Last7Days.range(now);
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(range.end, now);

        let range = ReportPeriod::LastYear.range(now);
        assert_eq!(range.start.date_naive(), NaiveDate::from_ymd_opt(2023, 3, 10).unwrap());
    }

    #[tokio::test]
    async fn test_report_aggregates() {
        let backend = MemoryBackend::new();
        backend.seed_demo_data();
        let now = Utc::now();
        let regular = Uuid::new_v4();
        for days_ago in [0, 1] {
            backend.put_checkin(CheckIn {
                id: Uuid::new_v4(),
                customer_id: regular,
                points: 5,
                created_at: now - Duration::days(days_ago),
            });
        }
        // Outside a 7-day window.
        backend.put_checkin(CheckIn {
            id: Uuid::new_v4(),
            customer_id: regular,
            points: 5,
            created_at: now - Duration::days(20),
        });
        let rewards = backend.list_rewards().await.unwrap();
        let coffee = rewards.iter().find(|r| r.name == "Free Coffee").unwrap();
        let pastry = rewards.iter().find(|r| r.name == "50% Off Pastry").unwrap();
        for reward_id in [coffee.id, coffee.id, pastry.id] {
            backend.put_redemption(Redemption {
                id: Uuid::new_v4(),
                customer_id: regular,
                reward_id,
                points_used: 100,
                redeemed_at: now,
            });
        }

        let report = build_report(&backend, ReportPeriod::Last7Days, now).await.unwrap();
        assert_eq!(report.daily_visits.len(), 7);
        assert_eq!(report.daily_points.len(), 7);
        // Seeded check-ins at 1, 2, 3 and 5 days ago plus the two above.
        assert_eq!(report.total_visits, 6);
        assert_eq!(
            report.daily_visits.iter().map(|d| d.count).sum::<u64>(),
            report.total_visits
        );
        assert_eq!(report.returning_customers, 1);
        assert_eq!(report.total_redemptions, 3);
        assert_eq!(report.most_popular_reward.as_deref(), Some("Free Coffee"));
        assert_eq!(report.points_issued, 1200 + 560 + 1800 + 380 + 1480 + 440);
        assert_eq!(report.new_customers, 0);
    }

    #[tokio::test]
    async fn test_empty_report() {
        let backend = MemoryBackend::new();
        let report = build_report(&backend, ReportPeriod::Last30Days, Utc::now()).await.unwrap();
        assert_eq!(report.total_visits, 0);
        assert_eq!(report.daily_visits.len(), 30);
        assert!(report.most_popular_reward.is_none());
        assert!(report.top_rewards.is_empty());
    }
}
