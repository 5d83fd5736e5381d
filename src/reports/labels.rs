use std::collections::HashMap;

use super::window::Period;

/// Display labels for column headers and period symbols. Built once at
/// startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct Labels {
    headers: HashMap<String, String>,
    periods: HashMap<Period, String>,
}

impl Labels {
    pub fn from_pairs<'a>(
        headers: impl IntoIterator<Item = (&'a str, &'a str)>,
        periods: impl IntoIterator<Item = (Period, &'a str)>,
    ) -> Self {
        Self {
            headers: headers.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            periods: periods.into_iter().map(|(k, v)| (k, v.to_string())).collect(),
        }
    }

    pub fn vietnamese() -> Self {
        Self::from_pairs(
            [
                ("document_date", "Ngày chứng từ"),
                ("doc_date", "Ngày chứng từ"),
                ("sales_order_number", "Mã đơn bán hàng"),
                ("shipping_order", "Mã đơn bán hàng"),
                ("customer_name", "Tên khách hàng"),
                ("currency_type", "Nguyên tệ"),
                ("total_amt_trans", "Nguyên tệ"),
                ("currency", "Nội tệ"),
                ("total_amt", "Nội tệ"),
                ("detailed_order_number", "Mã đơn hàng chi tiết"),
                ("order_no", "Mã đơn hàng chi tiết"),
                ("invoice_number", "Hóa đơn"),
                ("notes", "Ghi chú"),
                ("ar_type", "Loại chứng từ"),
            ],
            [
                (Period::SevenDays, "7 ngày gần nhất"),
                (Period::ThirtyDays, "30 ngày gần nhất"),
                (Period::ThreeMonths, "3 tháng gần nhất"),
                (Period::CurrentMonth, "Tháng hiện tại"),
                (Period::LastMonth, "Tháng trước"),
            ],
        )
    }

    /// Header for `field`, or the field name itself when unmapped.
    pub fn header<'a>(&'a self, field: &'a str) -> &'a str {
        self.headers.get(field).map(String::as_str).unwrap_or(field)
    }

    pub fn period(&self, period: Period) -> &str {
        self.periods.get(&period).map(String::as_str).unwrap_or(period.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_field_falls_back_to_name() {
        let labels = Labels::vietnamese();
        assert_eq!(labels.header("customer_name"), "Tên khách hàng");
        assert_eq!(labels.header("warehouse_code"), "warehouse_code");
    }

    #[test]
    fn every_period_has_a_label() {
        let labels = Labels::vietnamese();
        for period in Period::ALL {
            assert_ne!(labels.period(period), period.as_str());
        }
        assert_eq!(labels.period(Period::CurrentMonth), "Tháng hiện tại");
        assert_eq!(Labels::default().period(Period::LastMonth), "lastmonth");
    }
}
