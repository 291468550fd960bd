use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::db::{models::City, Database};

pub struct CityRepository<'a> {
    conn: &'a Connection,
}

impl<'a> CityRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Returns the stored city, inserting it the first time the pair is seen.
    pub fn ensure_city(&self, name: &str, country: &str) -> Result<City> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO cities (name, country) VALUES (?1, ?2)",
                params![name, country],
            )
            .with_context(|| format!("failed to insert city {name}, {country}"))?;

        let city = self.conn.query_row(
            "SELECT id, name, country FROM cities WHERE name = ?1 AND country = ?2",
            params![name, country],
            |row| {
                Ok(City {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    country: row.get(2)?,
                })
            },
        )?;
        Ok(city)
    }
}

impl Database {
    pub async fn ensure_city(&self, name: &str, country: &str) -> Result<City> {
        let name = name.to_string();
        let country = country.to_string();
        self.execute(move |conn| CityRepository::new(conn).ensure_city(&name, &country))
            .await
    }
}
