// 🔎 Listing filters for the loan register and the branch list

use crate::entities::{Bank, Loan};
use crate::identity::canonical_reference;
use chrono::NaiveDate;
use serde::Deserialize;

/// All criteria are optional; an empty filter matches every loan.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanFilter {
    /// Substring of the loan id or customer name, case-insensitive
    #[serde(default)]
    pub search: Option<String>,

    /// Bank reference (UUIDs compare case-insensitively)
    #[serde(default)]
    pub bank_id: Option<String>,

    /// Exact appraisal date
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl LoanFilter {
    pub fn is_empty(&self) -> bool {
        self.search.as_deref().map_or(true, |s| s.is_empty())
            && self.bank_id.as_deref().map_or(true, |b| b.is_empty())
            && self.date.is_none()
    }

    pub fn matches(&self, loan: &Loan) -> bool {
        let matches_search = match self.search.as_deref() {
            None | Some("") => true,
            Some(query) => {
                let query = query.to_lowercase();
                loan.id.key().to_lowercase().contains(&query)
                    || loan
                        .customer_name
                        .as_deref()
                        .is_some_and(|c| c.to_lowercase().contains(&query))
            }
        };

        let matches_bank = match self.bank_id.as_deref() {
            None | Some("") => true,
            Some(bank_id) => canonical_reference(&loan.bank_id) == canonical_reference(bank_id),
        };

        let matches_date = self.date.map_or(true, |d| loan.date == d);

        matches_search && matches_bank && matches_date
    }

    /// Keep matching loans, preserving order
    pub fn apply<'a>(&self, loans: &'a [Loan]) -> Vec<&'a Loan> {
        loans.iter().filter(|l| self.matches(l)).collect()
    }
}

/// Branch list filter (case-insensitive name substring)
pub fn filter_banks<'a>(banks: &'a [Bank], query: &str) -> Vec<&'a Bank> {
    banks.iter().filter(|b| b.matches_search(query)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::RecordId;

    fn loan(id: &str, bank: &str, date: &str, customer: Option<&str>) -> Loan {
        let mut loan = Loan::new(bank, NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap())
            .with_customer(customer.map(String::from));
        loan.id = RecordId::classify(id);
        loan
    }

    fn sample() -> Vec<Loan> {
        vec![
            loan("550e8400-e29b-41d4-a716-446655440000", "b1", "2024-05-01", Some("Ravi Kumar")),
            loan("550e8400-e29b-41d4-a716-446655440001", "b2", "2024-05-02", None),
            loan("550e8400-e29b-41d4-a716-446655440002", "b1", "2024-05-02", Some("Meena")),
        ]
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let loans = sample();
        let filter = LoanFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&loans).len(), 3);
    }

    #[test]
    fn test_search_by_customer_or_id() {
        let loans = sample();

        let by_customer = LoanFilter { search: Some("RAVI".to_string()), ..Default::default() };
        assert_eq!(by_customer.apply(&loans).len(), 1);

        let by_id = LoanFilter { search: Some("440001".to_string()), ..Default::default() };
        let hits = by_id.apply(&loans);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].bank_id, "b2");
    }

    #[test]
    fn test_bank_and_date_combine() {
        let loans = sample();
        let filter = LoanFilter {
            bank_id: Some("b1".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 5, 2),
            ..Default::default()
        };

        let hits = filter.apply(&loans);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].customer_name.as_deref(), Some("Meena"));
    }

    #[test]
    fn test_bank_reference_ignores_uuid_case() {
        let bank = "6f9619ff-8b86-d011-b42d-00c04fc964ff";
        let loans = vec![loan("L-1", &bank.to_uppercase(), "2024-05-01", None)];

        let filter = LoanFilter { bank_id: Some(bank.to_string()), ..Default::default() };
        assert_eq!(filter.apply(&loans).len(), 1);

        // Non-UUID references stay exact
        let other = LoanFilter { bank_id: Some("B1".to_string()), ..Default::default() };
        assert!(other.apply(&sample()).is_empty());
    }

    #[test]
    fn test_filter_banks() {
        let banks = vec![Bank::new("AU Bank Lalgudi"), Bank::new("Canara Trichy")];
        assert_eq!(filter_banks(&banks, "lalgudi").len(), 1);
        assert_eq!(filter_banks(&banks, "").len(), 2);
    }
}
