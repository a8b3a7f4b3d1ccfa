//! Loan lifecycle of a single copy and the due-date window rule.
//!
//! ```text
//! Maintenance -> Available <-> Reserved
//!                  |  ^           |
//!            issue |  | return    | issue
//!                  v  |           |
//!                 On loan <-------+
//!                  |  ^
//!                  +--+ renew
//! ```
//!
//! Available and Reserved copies may also go back to Maintenance.

use serde::Serialize;
use stacks_http::{AppError, FieldError};
use stacks_kernel::settings::CatalogSettings;
use thiserror::Error;
use time::{Date, Duration};

use super::models::{BookInstance, InstanceId, LoanState, LoanStatus};

pub const IN_PAST: &str = "Invalid date - renewal in past";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("copy cannot move from {from} to {to}")]
    Invalid { from: LoanStatus, to: LoanStatus },
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::conflict(vec![], err.to_string())
    }
}

impl BookInstance {
    pub fn new(book: u64, imprint: impl Into<String>) -> Self {
        Self {
            id: InstanceId::new(),
            book,
            imprint: imprint.into(),
            loan: LoanState::Maintenance,
        }
    }

    /// Move between the states that carry no loan details.
    pub fn set_status(&mut self, to: LoanStatus) -> Result<(), TransitionError> {
        let from = self.status();
        let next = match (from, to) {
            (LoanStatus::Maintenance, LoanStatus::Maintenance) => LoanState::Maintenance,
            (LoanStatus::Maintenance, LoanStatus::Available) => LoanState::Available,
            (LoanStatus::Available | LoanStatus::Reserved, LoanStatus::Maintenance) => {
                LoanState::Maintenance
            }
            (LoanStatus::Available | LoanStatus::Reserved, LoanStatus::Available) => {
                LoanState::Available
            }
            (LoanStatus::Available | LoanStatus::Reserved, LoanStatus::Reserved) => {
                LoanState::Reserved
            }
            _ => return Err(TransitionError::Invalid { from, to }),
        };
        self.loan = next;
        Ok(())
    }

    /// Lend an available or reserved copy. Borrower and due date are set together.
    pub fn issue(&mut self, borrower: impl Into<String>, due_back: Date) -> Result<(), TransitionError> {
        match self.status() {
            LoanStatus::Available | LoanStatus::Reserved => {
                self.loan = LoanState::OnLoan {
                    borrower: borrower.into(),
                    due_back,
                };
                Ok(())
            }
            from => Err(TransitionError::Invalid {
                from,
                to: LoanStatus::OnLoan,
            }),
        }
    }

    /// Take a copy back; clears borrower and due date. Returns who had it.
    pub fn mark_returned(&mut self) -> Result<String, TransitionError> {
        match std::mem::take(&mut self.loan) {
            LoanState::OnLoan { borrower, .. } => {
                self.loan = LoanState::Available;
                Ok(borrower)
            }
            other => {
                let from = other.status();
                self.loan = other;
                Err(TransitionError::Invalid {
                    from,
                    to: LoanStatus::Available,
                })
            }
        }
    }

    /// Move the due date of a copy on loan. Returns the previous due date.
    pub fn renew(&mut self, new_due_back: Date) -> Result<Date, TransitionError> {
        match &mut self.loan {
            LoanState::OnLoan { due_back, .. } => Ok(std::mem::replace(due_back, new_due_back)),
            other => Err(TransitionError::Invalid {
                from: other.status(),
                to: LoanStatus::OnLoan,
            }),
        }
    }
}

/// Accepted range for a due date: from today up to `max_days` ahead, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalWindow {
    pub default_days: i64,
    pub max_days: i64,
}

impl Default for RenewalWindow {
    fn default() -> Self {
        Self {
            default_days: 21,
            max_days: 28,
        }
    }
}

impl RenewalWindow {
    pub fn from_settings(settings: &CatalogSettings) -> Self {
        Self {
            default_days: settings.renewal_default_days,
            max_days: settings.renewal_max_days,
        }
    }

    /// Date proposed when the renewal form is first shown.
    pub fn initial(&self, today: Date) -> Date {
        today.saturating_add(Duration::days(self.default_days))
    }

    pub fn latest(&self, today: Date) -> Date {
        today.saturating_add(Duration::days(self.max_days))
    }

    pub fn check(&self, field: &str, proposed: Date, today: Date) -> Result<Date, FieldError> {
        if proposed < today {
            return Err(FieldError::new(field, IN_PAST));
        }
        if proposed > self.latest(today) {
            return Err(FieldError::new(field, self.too_far_message()));
        }
        Ok(proposed)
    }

    fn too_far_message(&self) -> String {
        if self.max_days % 7 == 0 {
            format!(
                "Invalid date - renewal more than {} weeks ahead",
                self.max_days / 7
            )
        } else {
            format!(
                "Invalid date - renewal more than {} days ahead",
                self.max_days
            )
        }
    }
}

/// Something that happened to a copy, published on the catalog event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoanEvent {
    Created {
        instance: InstanceId,
        book: u64,
    },
    StatusChanged {
        instance: InstanceId,
        from: LoanStatus,
        to: LoanStatus,
    },
    Issued {
        instance: InstanceId,
        borrower: String,
        due_back: Date,
    },
    Returned {
        instance: InstanceId,
        borrower: String,
    },
    Renewed {
        instance: InstanceId,
        borrower: String,
        from: Date,
        to: Date,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    const TODAY: Date = date!(2024 - 03 - 01);

    fn copy() -> BookInstance {
        BookInstance::new(1, "Unlikely Imprint, 2016")
    }

    fn assert_loan_invariant(copy: &BookInstance) {
        let on_loan = copy.status() == LoanStatus::OnLoan;
        assert_eq!(on_loan, copy.borrower().is_some());
        assert_eq!(on_loan, copy.due_back().is_some());
    }

    #[test]
    fn full_lifecycle_scenario() {
        let mut x = copy();
        assert_eq!(x.status(), LoanStatus::Maintenance);
        assert_loan_invariant(&x);

        x.set_status(LoanStatus::Available).unwrap();
        assert_loan_invariant(&x);

        let due = date!(2024 - 03 - 10);
        x.issue("B", due).unwrap();
        assert_eq!(x.status(), LoanStatus::OnLoan);
        assert_eq!(x.borrower(), Some("B"));
        assert_eq!(x.due_back(), Some(due));

        let previous = x.renew(due + Duration::days(7)).unwrap();
        assert_eq!(previous, due);
        assert_eq!(x.due_back(), Some(date!(2024 - 03 - 17)));
        assert_eq!(x.borrower(), Some("B"));
        assert_eq!(x.status(), LoanStatus::OnLoan);

        assert_eq!(x.mark_returned().unwrap(), "B");
        assert_eq!(x.status(), LoanStatus::Available);
        assert_loan_invariant(&x);
    }

    #[test]
    fn maintenance_copies_cannot_be_lent_or_reserved() {
        let mut x = copy();
        assert_eq!(
            x.issue("B", TODAY),
            Err(TransitionError::Invalid {
                from: LoanStatus::Maintenance,
                to: LoanStatus::OnLoan
            })
        );
        assert!(x.set_status(LoanStatus::Reserved).is_err());
        assert_eq!(x.status(), LoanStatus::Maintenance);
    }

    #[test]
    fn on_loan_is_left_only_by_return() {
        let mut x = copy();
        x.set_status(LoanStatus::Available).unwrap();
        x.issue("B", TODAY).unwrap();

        for to in LoanStatus::ALL {
            assert!(x.set_status(to).is_err(), "{to:?}");
        }
        assert!(x.issue("C", TODAY).is_err());
        assert_eq!(x.borrower(), Some("B"));
    }

    #[test]
    fn reserved_copy_can_be_issued() {
        let mut x = copy();
        x.set_status(LoanStatus::Available).unwrap();
        x.set_status(LoanStatus::Reserved).unwrap();
        x.issue("B", TODAY).unwrap();
        assert_loan_invariant(&x);
    }

    #[test]
    fn failed_return_keeps_state() {
        let mut x = copy();
        x.set_status(LoanStatus::Available).unwrap();
        assert!(x.mark_returned().is_err());
        assert_eq!(x.status(), LoanStatus::Available);
        assert!(x.renew(TODAY).is_err());
    }

    #[test]
    fn window_accepts_today_through_four_weeks() {
        let window = RenewalWindow::default();
        assert_eq!(window.check("renewal_date", TODAY, TODAY), Ok(TODAY));

        let last_day = TODAY + Duration::days(28);
        assert_eq!(window.check("renewal_date", last_day, TODAY), Ok(last_day));
    }

    #[test]
    fn window_rejects_past_and_far_future() {
        let window = RenewalWindow::default();

        let yesterday = TODAY - Duration::days(1);
        assert_eq!(
            window.check("renewal_date", yesterday, TODAY),
            Err(FieldError::new("renewal_date", IN_PAST))
        );

        let too_far = TODAY + Duration::days(29);
        assert_eq!(
            window.check("renewal_date", too_far, TODAY),
            Err(FieldError::new(
                "renewal_date",
                "Invalid date - renewal more than 4 weeks ahead"
            ))
        );
    }

    #[test]
    fn initial_date_is_three_weeks_out() {
        assert_eq!(RenewalWindow::default().initial(TODAY), date!(2024 - 03 - 22));
    }
}
