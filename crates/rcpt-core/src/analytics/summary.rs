//! Spending statistics over a set of receipts.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::models::receipt::{Category, Currency, Receipt};

/// Standard deviations above the mean that mark a receipt as unusual.
pub const ANOMALY_SIGMA: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorSummary {
    pub vendor: String,
    pub count: usize,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
    pub last_visit: NaiveDate,
    /// Fraction of all receipts from this vendor.
    pub frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    pub count: usize,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
    /// Share of total spend, in percent.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    /// `YYYY-MM`.
    pub month: String,
    pub count: usize,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencySummary {
    pub currency: Currency,
    pub count: usize,
    pub total_amount: Decimal,
    /// Share of receipts, in percent.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdaySummary {
    pub weekday: String,
    pub count: usize,
    pub total_amount: Decimal,
}

/// Day-of-week and repeat-visit behaviour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingPatterns {
    /// Monday first; days without receipts are included with zero totals.
    pub by_weekday: Vec<WeekdaySummary>,
    /// Sample standard deviation of amounts.
    pub amount_std_dev: f64,
    pub unique_vendors: usize,
    pub repeat_vendors: usize,
    /// Share of vendors visited more than once.
    pub vendor_loyalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Anomaly {
    HighAmount {
        receipt_id: i64,
        vendor: String,
        amount: Decimal,
        date: NaiveDate,
        /// Distance from the mean in standard deviations.
        deviation: f64,
    },
    PotentialDuplicate {
        receipt_id: i64,
        vendor: String,
        amount: Decimal,
        date: NaiveDate,
        similar_to: i64,
    },
}

/// Aggregate view of a receipt collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub total_receipts: usize,
    pub total_amount: Decimal,
    pub average_amount: Decimal,
    pub median_amount: Decimal,
    /// Highest spend first.
    pub by_vendor: Vec<VendorSummary>,
    /// Highest spend first.
    pub by_category: Vec<CategorySummary>,
    /// Chronological.
    pub by_month: Vec<MonthSummary>,
    pub by_currency: Vec<CurrencySummary>,
    pub patterns: SpendingPatterns,
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingVelocity {
    pub daily_average: f64,
    pub weekly_average: f64,
    pub monthly_average: f64,
    pub total_amount: Decimal,
    pub period_days: i64,
}

/// Compute totals, breakdowns, patterns and anomalies.
///
/// Amounts are summed as-is across currencies.
pub fn summarize(receipts: &[Receipt]) -> Analytics {
    let total_receipts = receipts.len();
    let total_amount: Decimal = receipts.iter().map(|r| r.amount).sum();

    Analytics {
        total_receipts,
        total_amount,
        average_amount: average(total_amount, total_receipts),
        median_amount: median(receipts),
        by_vendor: vendor_breakdown(receipts),
        by_category: category_breakdown(receipts, total_amount),
        by_month: month_breakdown(receipts),
        by_currency: currency_breakdown(receipts),
        patterns: spending_patterns(receipts),
        anomalies: detect_anomalies(receipts),
    }
}

/// Vendors by total spend: `(vendor, total, count)`.
pub fn top_vendors(receipts: &[Receipt], limit: usize) -> Vec<(String, Decimal, usize)> {
    vendor_breakdown(receipts)
        .into_iter()
        .take(limit)
        .map(|v| (v.vendor, v.total_amount, v.count))
        .collect()
}

/// Average spend per day/week/month over the `days` before `today`.
///
/// The period starts at the oldest receipt inside the window, so a short
/// history is not diluted by empty days.
pub fn spending_velocity(receipts: &[Receipt], today: NaiveDate, days: i64) -> SpendingVelocity {
    let cutoff = today - Duration::days(days.max(0));
    let recent: Vec<&Receipt> = receipts
        .iter()
        .filter(|r| r.transaction_date >= cutoff && r.transaction_date <= today)
        .collect();

    let Some(oldest) = recent.iter().map(|r| r.transaction_date).min() else {
        return SpendingVelocity {
            daily_average: 0.0,
            weekly_average: 0.0,
            monthly_average: 0.0,
            total_amount: Decimal::ZERO,
            period_days: 0,
        };
    };

    let total_amount: Decimal = recent.iter().map(|r| r.amount).sum();
    let period_days = (today - oldest).num_days() + 1;
    let daily = to_f64(total_amount) / period_days as f64;

    SpendingVelocity {
        daily_average: daily,
        weekly_average: daily * 7.0,
        monthly_average: daily * 30.0,
        total_amount,
        period_days,
    }
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    (total / Decimal::from(count)).round_dp(2)
}

fn median(receipts: &[Receipt]) -> Decimal {
    let mut amounts: Vec<Decimal> = receipts.iter().map(|r| r.amount).collect();
    amounts.sort();
    match amounts.len() {
        0 => Decimal::ZERO,
        n if n % 2 == 1 => amounts[n / 2],
        n => ((amounts[n / 2 - 1] + amounts[n / 2]) / Decimal::TWO).round_dp(2),
    }
}

fn std_dev(amounts: &[f64]) -> f64 {
    if amounts.len() < 2 {
        return 0.0;
    }
    let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
    let variance =
        amounts.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / (amounts.len() - 1) as f64;
    variance.sqrt()
}

fn vendor_breakdown(receipts: &[Receipt]) -> Vec<VendorSummary> {
    let mut map: HashMap<&str, (usize, Decimal, NaiveDate)> = HashMap::new();
    for r in receipts {
        let entry = map
            .entry(r.vendor.as_str())
            .or_insert((0, Decimal::ZERO, r.transaction_date));
        entry.0 += 1;
        entry.1 += r.amount;
        entry.2 = entry.2.max(r.transaction_date);
    }

    let mut vendors: Vec<VendorSummary> = map
        .into_iter()
        .map(|(vendor, (count, total, last_visit))| VendorSummary {
            vendor: vendor.to_string(),
            count,
            total_amount: total,
            average_amount: average(total, count),
            last_visit,
            frequency: count as f64 / receipts.len() as f64,
        })
        .collect();

    vendors.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then_with(|| a.vendor.cmp(&b.vendor))
    });
    vendors
}

fn category_breakdown(receipts: &[Receipt], total: Decimal) -> Vec<CategorySummary> {
    let mut map: BTreeMap<Category, (usize, Decimal)> = BTreeMap::new();
    for r in receipts {
        let entry = map.entry(r.category).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += r.amount;
    }

    let mut categories: Vec<CategorySummary> = map
        .into_iter()
        .map(|(category, (count, sum))| CategorySummary {
            category,
            count,
            total_amount: sum,
            average_amount: average(sum, count),
            percentage: if total.is_zero() {
                0.0
            } else {
                to_f64(sum / total * Decimal::ONE_HUNDRED)
            },
        })
        .collect();

    // Stable: equal totals keep category order.
    categories.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
    categories
}

fn month_breakdown(receipts: &[Receipt]) -> Vec<MonthSummary> {
    let mut map: BTreeMap<String, (usize, Decimal)> = BTreeMap::new();
    for r in receipts {
        let entry = map
            .entry(r.transaction_date.format("%Y-%m").to_string())
            .or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += r.amount;
    }

    map.into_iter()
        .map(|(month, (count, total))| MonthSummary {
            month,
            count,
            total_amount: total,
            average_amount: average(total, count),
        })
        .collect()
}

fn currency_breakdown(receipts: &[Receipt]) -> Vec<CurrencySummary> {
    let mut map: BTreeMap<Currency, (usize, Decimal)> = BTreeMap::new();
    for r in receipts {
        let entry = map.entry(r.currency).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += r.amount;
    }

    map.into_iter()
        .map(|(currency, (count, total))| CurrencySummary {
            currency,
            count,
            total_amount: total,
            percentage: count as f64 / receipts.len() as f64 * 100.0,
        })
        .collect()
}

fn spending_patterns(receipts: &[Receipt]) -> SpendingPatterns {
    const WEEK: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    let by_weekday = WEEK
        .iter()
        .map(|day| {
            let on_day = receipts.iter().filter(|r| r.transaction_date.weekday() == *day);
            WeekdaySummary {
                weekday: weekday_name(*day).to_string(),
                count: on_day.clone().count(),
                total_amount: on_day.map(|r| r.amount).sum(),
            }
        })
        .collect();

    let amounts: Vec<f64> = receipts.iter().map(|r| to_f64(r.amount)).collect();

    let mut visits: HashMap<&str, usize> = HashMap::new();
    for r in receipts {
        *visits.entry(r.vendor.as_str()).or_default() += 1;
    }
    let unique_vendors = visits.len();
    let repeat_vendors = visits.values().filter(|&&n| n > 1).count();

    SpendingPatterns {
        by_weekday,
        amount_std_dev: std_dev(&amounts),
        unique_vendors,
        repeat_vendors,
        vendor_loyalty: if unique_vendors == 0 {
            0.0
        } else {
            repeat_vendors as f64 / unique_vendors as f64
        },
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn detect_anomalies(receipts: &[Receipt]) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    if receipts.len() >= 3 {
        let amounts: Vec<f64> = receipts.iter().map(|r| to_f64(r.amount)).collect();
        let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
        let sigma = std_dev(&amounts);
        let threshold = mean + ANOMALY_SIGMA * sigma;

        if sigma > 0.0 {
            for (r, amount) in receipts.iter().zip(&amounts) {
                if *amount > threshold {
                    anomalies.push(Anomaly::HighAmount {
                        receipt_id: r.id,
                        vendor: r.vendor.clone(),
                        amount: r.amount,
                        date: r.transaction_date,
                        deviation: (amount - mean) / sigma,
                    });
                }
            }
        }
    }

    let mut seen: HashMap<(String, Decimal, NaiveDate), i64> = HashMap::new();
    for r in receipts {
        let key = (r.vendor.to_lowercase(), r.amount.normalize(), r.transaction_date);
        match seen.get(&key) {
            Some(&first) => anomalies.push(Anomaly::PotentialDuplicate {
                receipt_id: r.id,
                vendor: r.vendor.clone(),
                amount: r.amount,
                date: r.transaction_date,
                similar_to: first,
            }),
            None => {
                seen.insert(key, r.id);
            }
        }
    }

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn receipt(id: i64, vendor: &str, date: (i32, u32, u32), cents: i64, category: Category) -> Receipt {
        Receipt {
            id,
            vendor: vendor.to_string(),
            transaction_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            amount: Decimal::new(cents, 2),
            items: vec![],
            category,
            payment_method: "Cash".to_string(),
            currency: Currency::USD,
            source_file: "r.jpg".to_string(),
            extracted_text: String::new(),
            confidence: 0.9,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample() -> Vec<Receipt> {
        vec![
            receipt(1, "Cafe", (2024, 1, 1), 1000, Category::Restaurants),
            receipt(2, "Cafe", (2024, 1, 2), 1000, Category::Restaurants),
            receipt(3, "Market", (2024, 1, 3), 2000, Category::Groceries),
            receipt(4, "Market", (2024, 2, 5), 3000, Category::Groceries),
        ]
    }

    #[test]
    fn test_totals() {
        let analytics = summarize(&sample());
        assert_eq!(analytics.total_receipts, 4);
        assert_eq!(analytics.total_amount, Decimal::new(7000, 2));
        assert_eq!(analytics.average_amount, Decimal::new(1750, 2));
        assert_eq!(analytics.median_amount, Decimal::new(1500, 2));
    }

    #[test]
    fn test_breakdowns() {
        let analytics = summarize(&sample());

        assert_eq!(analytics.by_vendor[0].vendor, "Market");
        assert_eq!(analytics.by_vendor[0].total_amount, Decimal::new(5000, 2));
        assert_eq!(
            analytics.by_vendor[0].last_visit,
            NaiveDate::from_ymd_opt(2024, 2, 5).unwrap()
        );

        assert_eq!(analytics.by_category[0].category, Category::Groceries);
        assert!((analytics.by_category[0].percentage - 71.428).abs() < 0.01);

        let months: Vec<&str> = analytics.by_month.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02"]);

        assert_eq!(analytics.by_currency.len(), 1);
        assert_eq!(analytics.by_currency[0].percentage, 100.0);
    }

    #[test]
    fn test_patterns() {
        let patterns = summarize(&sample()).patterns;
        assert_eq!(patterns.by_weekday.len(), 7);
        // 2024-01-01 was a Monday.
        assert_eq!(patterns.by_weekday[0].weekday, "Monday");
        assert_eq!(patterns.by_weekday[0].count, 2);
        assert_eq!(patterns.unique_vendors, 2);
        assert_eq!(patterns.repeat_vendors, 2);
        assert_eq!(patterns.vendor_loyalty, 1.0);
        assert!(patterns.amount_std_dev > 0.0);
    }

    #[test]
    fn test_high_amount_anomaly() {
        let mut receipts: Vec<Receipt> = (1..=9)
            .map(|i| receipt(i, &format!("Shop {i}"), (2024, 1, i as u32), 1000, Category::Other))
            .collect();
        receipts.push(receipt(10, "Jeweller", (2024, 1, 20), 100_000, Category::Shopping));

        let anomalies = summarize(&receipts).anomalies;
        assert_eq!(anomalies.len(), 1);
        assert!(matches!(anomalies[0], Anomaly::HighAmount { receipt_id: 10, .. }));
    }

    #[test]
    fn test_duplicates() {
        let receipts = vec![
            receipt(1, "Cafe", (2024, 1, 1), 450, Category::Restaurants),
            receipt(2, "CAFE", (2024, 1, 1), 450, Category::Restaurants),
        ];
        let anomalies = summarize(&receipts).anomalies;
        assert_eq!(
            anomalies,
            vec![Anomaly::PotentialDuplicate {
                receipt_id: 2,
                vendor: "CAFE".to_string(),
                amount: Decimal::new(450, 2),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                similar_to: 1,
            }]
        );
    }

    #[test]
    fn test_empty() {
        let analytics = summarize(&[]);
        assert_eq!(analytics.total_amount, Decimal::ZERO);
        assert_eq!(analytics.median_amount, Decimal::ZERO);
        assert!(analytics.by_vendor.is_empty());
        assert!(analytics.anomalies.is_empty());
    }

    #[test]
    fn test_top_vendors_and_velocity() {
        let receipts = sample();
        let top = top_vendors(&receipts, 1);
        assert_eq!(top, vec![("Market".to_string(), Decimal::new(5000, 2), 2)]);

        let today = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();
        let velocity = spending_velocity(&receipts, today, 30);
        // Only the 2024-02-05 receipt is inside the window ending today.
        assert_eq!(velocity.total_amount, Decimal::new(3000, 2));
        assert_eq!(velocity.period_days, 1);
        assert_eq!(velocity.daily_average, 30.0);
        assert_eq!(velocity.weekly_average, 210.0);
    }
}
