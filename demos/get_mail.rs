//! Low-level walk through the mail.tm API without a session manager.
//!
//! Registers an account by hand, polls its inbox for up to two minutes and
//! prints the first message it receives.

use std::io::Write;
use tempmail_session::Client;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Testing the mail.tm client...");
    println!("{}", "-".repeat(50));

    let client = Client::new()?;

    let domains = client.domains().await?;
    let domain = domains.first().ok_or("no domains available")?;
    println!("✅ Using domain {}", domain.domain);

    let address = format!("demo{}@{}", rand::random::<u32>(), domain.domain);
    let password = format!("{:08x}*Temp", rand::random::<u32>());
    client.create_account(&address, &password).await?;
    let token = client.token(&address, &password).await?;
    println!("\n✅ Created temporary email: {address}");

    println!("\n⏳ Polling for messages (2 min max)... Send an email to: {address}");
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(120);

    loop {
        let messages = client.get_messages(&token).await?;

        if let Some(msg) = messages.first() {
            println!("\n✅ Message received from {}", msg.sender());
            let details = client.fetch_message(&token, &msg.id).await?;
            println!("   Subject: {}", msg.subject_or_default());
            println!("   Body:\n{}", details.body());

            client.delete_message(&token, &msg.id).await?;
            println!("\n🗑️  Message deleted");
            break;
        }

        if start.elapsed() >= timeout {
            println!("\n⚠️  Timeout: No messages received after 2 minutes");
            break;
        }

        let remaining = (timeout - start.elapsed()).as_secs();
        print!("\r   {remaining} seconds remaining...    ");
        std::io::stdout().flush().ok();
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }

    Ok(())
}
