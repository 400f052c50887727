// src/db/subscribers.rs

use crate::criteria::CriteriaConfig;
use crate::errors::TrackerError;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

#[derive(Debug, Clone, PartialEq)]
pub struct EmailContact {
    pub address: String,
    pub get_errors: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhoneContact {
    pub phone_number: String,
    pub get_errors: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushContact {
    pub push_token: String,
    pub get_errors: bool,
}

/// One notification recipient with their importance criteria and channel
/// contacts.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: i64,
    pub name: String,
    pub important_only: bool,
    pub criteria: CriteriaConfig,
    pub emails: Vec<EmailContact>,
    pub phones: Vec<PhoneContact>,
    pub push_tokens: Vec<PushContact>,
}

impl Subscriber {
    pub fn error_emails(&self) -> Vec<String> {
        self.emails
            .iter()
            .filter(|c| c.get_errors)
            .map(|c| c.address.clone())
            .collect()
    }

    pub fn error_phones(&self) -> Vec<String> {
        self.phones
            .iter()
            .filter(|c| c.get_errors)
            .map(|c| c.phone_number.clone())
            .collect()
    }

    pub fn error_push_tokens(&self) -> Vec<String> {
        self.push_tokens
            .iter()
            .filter(|c| c.get_errors)
            .map(|c| c.push_token.clone())
            .collect()
    }
}

pub fn list_subscribers(conn: &Connection) -> Result<Vec<Subscriber>, TrackerError> {
    let mut stmt =
        conn.prepare("SELECT id, name, important_only, criteria FROM subscribers ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut subscribers = Vec::with_capacity(rows.len());
    for (id, name, important_only, criteria_json) in rows {
        let criteria: CriteriaConfig = serde_json::from_str(&criteria_json)?;
        subscribers.push(Subscriber {
            id,
            name,
            important_only,
            criteria,
            emails: emails_for(conn, id)?,
            phones: phones_for(conn, id)?,
            push_tokens: push_tokens_for(conn, id)?,
        });
    }
    Ok(subscribers)
}

/// Explicitly stamps the subscriber's last-notified time; called at the
/// dispatch site after a digest goes out.
pub fn touch_last_notified(
    conn: &Connection,
    subscriber_id: i64,
    now: NaiveDateTime,
) -> Result<(), TrackerError> {
    conn.execute(
        "UPDATE subscribers SET last_notified_at = ?1 WHERE id = ?2",
        params![now, subscriber_id],
    )?;
    Ok(())
}

fn emails_for(conn: &Connection, subscriber_id: i64) -> Result<Vec<EmailContact>, TrackerError> {
    let mut stmt = conn.prepare(
        "SELECT address, get_errors FROM emails WHERE subscriber_id = ?1 ORDER BY address",
    )?;
    let contacts = stmt
        .query_map(params![subscriber_id], |row| {
            Ok(EmailContact {
                address: row.get(0)?,
                get_errors: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(contacts)
}

fn phones_for(conn: &Connection, subscriber_id: i64) -> Result<Vec<PhoneContact>, TrackerError> {
    let mut stmt = conn.prepare(
        "SELECT phone_number, get_errors FROM phone_numbers \
         WHERE subscriber_id = ?1 ORDER BY phone_number",
    )?;
    let contacts = stmt
        .query_map(params![subscriber_id], |row| {
            Ok(PhoneContact {
                phone_number: row.get(0)?,
                get_errors: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(contacts)
}

fn push_tokens_for(conn: &Connection, subscriber_id: i64) -> Result<Vec<PushContact>, TrackerError> {
    let mut stmt = conn.prepare(
        "SELECT push_token, get_errors FROM push_tokens \
         WHERE subscriber_id = ?1 ORDER BY push_token",
    )?;
    let contacts = stmt
        .query_map(params![subscriber_id], |row| {
            Ok(PushContact {
                push_token: row.get(0)?,
                get_errors: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(contacts)
}
