use clap::Args;
use mailer_email_impl::fail_for_invalid_email;

#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// The email address to validate
    address: String,
    /// Optional display name
    #[arg(long)]
    name: Option<String>,
}

impl ValidateCommand {
    pub fn invoke(self) -> anyhow::Result<()> {
        fail_for_invalid_email(Some(&self.address), self.name.as_deref())?;
        println!("valid");
        Ok(())
    }
}
