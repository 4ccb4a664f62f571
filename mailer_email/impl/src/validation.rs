use mailer_email_contracts::{display_address, MailError};
use mailer_models::email_address::EmailAddressWithName;
use mailer_utils::Filled;

/// Checks whether `address` together with the optional display `name` forms a
/// mailbox that can be used as sender or receiver.
pub fn is_valid_mail_address(address: Option<&str>, name: Option<&str>) -> bool {
    address
        .filled()
        .is_some_and(|address| EmailAddressWithName::from_parts(address, name).is_ok())
}

/// Like [`is_valid_mail_address`], but reports an invalid address as an error
/// that can be shown to the user.
pub fn fail_for_invalid_email(address: Option<&str>, name: Option<&str>) -> Result<(), MailError> {
    if is_valid_mail_address(address, name) {
        Ok(())
    } else {
        Err(MailError::InvalidAddress {
            address: display_address(address.unwrap_or_default(), name),
        })
    }
}
