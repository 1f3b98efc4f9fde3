mod util;

use figure_query::config::{CONFIG_ENV, ConfigError, EngineConfig};
use serial_test::serial;
use util::{EnvGuard, TempFixtureDir};

#[test]
#[serial]
fn explicit_config_env_wins() {
    let fixture = TempFixtureDir::new();
    let path = fixture.path().join("custom.toml");
    let _explicit = EnvGuard::set(CONFIG_ENV, path.to_string_lossy());
    let _xdg = EnvGuard::set("XDG_CONFIG_HOME", fixture.path().join("xdg").to_string_lossy());

    assert_eq!(EngineConfig::config_path().unwrap(), path);
}

#[test]
#[serial]
fn blank_config_env_falls_through_to_xdg() {
    let fixture = TempFixtureDir::new();
    let _explicit = EnvGuard::set(CONFIG_ENV, "  ");
    let _xdg = EnvGuard::set("XDG_CONFIG_HOME", fixture.path().to_string_lossy());

    assert_eq!(
        EngineConfig::config_path().unwrap(),
        fixture.path().join("figq").join("config.toml")
    );
}

#[test]
#[serial]
fn load_reads_xdg_file() {
    let fixture = TempFixtureDir::new();
    fixture.write(
        "figq/config.toml",
        "[table]\npage_size = 25\ndefault_sort = \"-date\"\n\n[logging]\nlevel = \"debug\"\n",
    );
    let _explicit = EnvGuard::unset(CONFIG_ENV);
    let _xdg = EnvGuard::set("XDG_CONFIG_HOME", fixture.path().to_string_lossy());

    let config = EngineConfig::load().unwrap();
    assert_eq!(config.table.page_size, 25);
    assert_eq!(config.table.default_sort, "-date");
    assert_eq!(config.table.column_size, "medium");
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn load_without_file_is_default() {
    let fixture = TempFixtureDir::new();
    let _explicit = EnvGuard::unset(CONFIG_ENV);
    let _xdg = EnvGuard::set("XDG_CONFIG_HOME", fixture.path().to_string_lossy());

    let config = EngineConfig::load().unwrap();
    assert_eq!(config.table.page_size, 12);
    assert_eq!(config.locale.grouping_separator, ",");
}

#[test]
fn save_then_load_keeps_settings() {
    let fixture = TempFixtureDir::new();
    let path = fixture.path().join("nested").join("config.toml");
    let mut config = EngineConfig::default();
    config.locale.grouping_separator = " ".into();
    config.table.page_size = 50;
    config.save_to(&path).unwrap();

    let loaded = EngineConfig::load_from(&path).unwrap();
    assert_eq!(loaded.locale.grouping_separator, " ");
    assert_eq!(loaded.table.page_size, 50);
}

#[test]
fn invalid_files_are_rejected() {
    let fixture = TempFixtureDir::new();

    let same_separators = fixture.write(
        "same.toml",
        "[locale]\ngrouping_separator = \".\"\ndecimal_separator = \".\"\n",
    );
    assert!(matches!(
        EngineConfig::load_from(&same_separators),
        Err(ConfigError::Validation(_))
    ));

    let not_toml = fixture.write("broken.toml", "[table\npage_size = ");
    assert!(matches!(
        EngineConfig::load_from(&not_toml),
        Err(ConfigError::Parse(_))
    ));
}
