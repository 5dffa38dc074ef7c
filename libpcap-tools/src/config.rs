use std::io;

/// Key/value configuration store, backed by a TOML document
///
/// Keys are dotted paths (`edit.seed`), each component being looked up
/// recursively in nested tables.
#[derive(Clone, Debug)]
pub struct Config {
    value: toml::Value,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            value: toml::Value::Table(toml::map::Map::new()),
        }
    }
}

impl Config {
    fn lookup<T: AsRef<str>>(&self, k: T) -> Option<&toml::Value> {
        let mut item = &self.value;
        for key in k.as_ref().split('.') {
            item = item.get(key)?;
        }
        Some(item)
    }

    /// Get a string entry by path. If the input argument contains dots, the path is split
    /// into keys, each key being requested recursively.
    pub fn get<T: AsRef<str>>(&self, k: T) -> Option<&str> {
        self.lookup(k)?.as_str()
    }

    /// Get an entry of type integer by path
    pub fn get_integer<T: AsRef<str>>(&self, k: T) -> Option<i64> {
        self.lookup(k)?.as_integer()
    }

    /// Get an entry of type integer by path, if positive
    pub fn get_usize<T: AsRef<str>>(&self, k: T) -> Option<usize> {
        self.get_integer(k)
            .and_then(|i| if i >= 0 { Some(i as usize) } else { None })
    }

    /// Get an entry of type boolean by path
    pub fn get_bool<T: AsRef<str>>(&self, k: T) -> Option<bool> {
        self.lookup(k)?.as_bool()
    }

    /// Set an entry by path, creating intermediate tables if needed.
    ///
    /// A non-table value found on the path is replaced by a table.
    pub fn set<T: AsRef<str>, V: Into<toml::Value>>(&mut self, k: T, v: V) {
        let mut keys: Vec<&str> = k.as_ref().split('.').collect();
        let last = match keys.pop() {
            Some(last) => last,
            None => return,
        };
        let mut item = &mut self.value;
        for key in keys {
            if !item.is_table() {
                *item = toml::Value::Table(toml::map::Map::new());
            }
            let table = match item.as_table_mut() {
                Some(t) => t,
                None => return,
            };
            item = table
                .entry(key)
                .or_insert(toml::Value::Table(toml::map::Map::new()));
        }
        if !item.is_table() {
            *item = toml::Value::Table(toml::map::Map::new());
        }
        if let Some(table) = item.as_table_mut() {
            table.insert(last.to_owned(), v.into());
        }
    }

    /// Load configuration from input object. Previous content is replaced
    pub fn load_config<R: io::Read>(&mut self, mut config: R) -> Result<(), io::Error> {
        let mut s = String::new();
        config.read_to_string(&mut s)?;
        match toml::from_str::<toml::Table>(&s) {
            Ok(table) => {
                debug!("Loaded configuration ({} top-level keys)", table.len());
                self.value = toml::Value::Table(table);
                Ok(())
            }
            Err(e) => {
                warn!("Load configuration failed: {}", e);
                Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Load configuration failed",
                ))
            }
        }
    }
}
