// Customer message composition

use crate::dates::to_display;
use crate::record::Record;

/// Shop name used in the message header when none is configured
pub const DEFAULT_SHOP_NAME: &str = "Vivek Mobile Accessories";

/// Compose the status message sent to a customer.
///
/// The header is wrapped in `*...*`, which WhatsApp renders as bold and SMS
/// shows literally. The return-date line is left out when the record has none.
pub fn compose_message(record: &Record, shop_name: &str) -> String {
    let return_date = to_display(&record.return_date);
    let return_line = if return_date.is_empty() {
        String::new()
    } else {
        format!("\nReturn Date: {}", return_date)
    };

    format!(
        "*{shop}*\n\nHello {name}\nThank you for trusting us — your support.\n\nProblem: {problem}\nAmount: {amount}\nStatus: {status}{return_line}\n\nThank you.",
        shop = shop_name,
        name = record.name,
        problem = record.problem,
        amount = record.ammount,
        status = record.status,
        return_line = return_line,
    )
}
