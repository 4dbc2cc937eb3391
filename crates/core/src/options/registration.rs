use std::sync::Arc;

use crate::config::ConfigSection;
use crate::container::IocContainer;
use crate::errors::CoreError;
use crate::options::factory::{ConfigureOptions, OptionsFactory, OptionsType, ValidateOptions};
use crate::options::manager::{Options, OptionsSnapshot};
use crate::options::monitor::OptionsMonitor;

/// Options registration on top of [`IocContainer`]
///
/// All registrations are "add if absent": binding the same options type a
/// second time keeps the first section.
pub trait OptionsServiceExt {
    /// Bind `T` to `section` and register its accessors
    ///
    /// Registers `OptionsFactory<T>`, `Options<T>` and `OptionsMonitor<T>` as
    /// singletons and `OptionsSnapshot<T>` as scoped.
    fn configure_options<T: OptionsType>(&mut self, section: ConfigSection) -> Result<&mut Self, CoreError>;

    /// Add a hook run on every freshly bound `T`, before validation
    fn add_options_configurator<T, C>(&mut self, configurator: C) -> Result<&mut Self, CoreError>
    where
        T: OptionsType,
        C: ConfigureOptions<T> + 'static;

    /// Add a validator run on every freshly bound `T`
    fn add_options_validator<T, V>(&mut self, validator: V) -> Result<&mut Self, CoreError>
    where
        T: OptionsType,
        V: ValidateOptions<T> + 'static;
}

impl OptionsServiceExt for IocContainer {
    fn configure_options<T: OptionsType>(&mut self, section: ConfigSection) -> Result<&mut Self, CoreError> {
        let path = section.path().to_string();

        // Hooks are collected on first use so they may be added in any order.
        let added = self.try_add_singleton::<OptionsFactory<T>, _>(move |ctx| {
            let configurators = ctx.resolve_all::<dyn ConfigureOptions<T>>()?;
            let validators = ctx.resolve_all::<dyn ValidateOptions<T>>()?;
            Ok(Arc::new(OptionsFactory::new(section.clone(), configurators, validators)))
        })?;

        if !added {
            tracing::debug!(
                options_type = std::any::type_name::<T>(),
                section = %path,
                "options already configured, keeping first section"
            );
        }

        self.try_add_singleton::<Options<T>, _>(|ctx| {
            let factory = ctx.resolve::<OptionsFactory<T>>()?;
            Options::create(&factory).map(Arc::new)
        })?;
        self.try_add_scoped::<OptionsSnapshot<T>, _>(|ctx| {
            let factory = ctx.resolve::<OptionsFactory<T>>()?;
            OptionsSnapshot::create(&factory).map(Arc::new)
        })?;
        self.try_add_singleton::<OptionsMonitor<T>, _>(|ctx| {
            let factory = ctx.resolve::<OptionsFactory<T>>()?;
            Ok(Arc::new(OptionsMonitor::new(factory)))
        })?;

        Ok(self)
    }

    fn add_options_configurator<T, C>(&mut self, configurator: C) -> Result<&mut Self, CoreError>
    where
        T: OptionsType,
        C: ConfigureOptions<T> + 'static,
    {
        let configurator: Arc<dyn ConfigureOptions<T>> = Arc::new(configurator);
        self.try_add_to_collection::<dyn ConfigureOptions<T>, C>(configurator)?;
        Ok(self)
    }

    fn add_options_validator<T, V>(&mut self, validator: V) -> Result<&mut Self, CoreError>
    where
        T: OptionsType,
        V: ValidateOptions<T> + 'static,
    {
        let validator: Arc<dyn ValidateOptions<T>> = Arc::new(validator);
        self.try_add_to_collection::<dyn ValidateOptions<T>, V>(validator)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::options::factory::ValidateOptionsResult;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Account {
        username: String,
        password: Option<String>,
    }

    struct Lowercase;

    impl ConfigureOptions<Account> for Lowercase {
        fn configure(&self, options: &mut Account) {
            options.username = options.username.to_lowercase();
        }
    }

    struct RequirePassword;

    impl ValidateOptions<Account> for RequirePassword {
        fn validate(&self, _name: &str, options: &Account) -> ValidateOptionsResult {
            match options.password {
                Some(_) => ValidateOptionsResult::Success,
                None => ValidateOptionsResult::fail("Invalid password."),
            }
        }
    }

    fn configuration() -> Configuration {
        Configuration::from_pairs([
            ("Primary:Username", Some("HOMERS")),
            ("Primary:Password", Some("secret")),
            ("Secondary:Username", Some("marge")),
            ("Secondary:Password", Some("secret")),
        ])
        .unwrap()
    }

    #[test]
    fn test_accessors_are_registered() {
        let config = configuration();
        let mut container = IocContainer::new();
        container.configure_options::<Account>(config.section("Primary")).unwrap();
        container.build().unwrap();

        assert!(container.contains::<OptionsFactory<Account>>());
        assert_eq!(container.resolve::<Options<Account>>().unwrap().value().username, "HOMERS");
        assert_eq!(
            container
                .resolve::<OptionsMonitor<Account>>()
                .unwrap()
                .current_value()
                .unwrap()
                .username,
            "HOMERS"
        );
    }

    #[test]
    fn test_first_section_wins() {
        let config = configuration();
        let mut container = IocContainer::new();
        container
            .configure_options::<Account>(config.section("Primary"))
            .unwrap()
            .configure_options::<Account>(config.section("Secondary"))
            .unwrap();
        container.build().unwrap();

        assert_eq!(container.service_count(), 4);
        let factory = container.resolve::<OptionsFactory<Account>>().unwrap();
        assert_eq!(factory.section().path(), "Primary");
    }

    #[test]
    fn test_hooks_registered_after_binding_apply() {
        let config = configuration();
        let mut container = IocContainer::new();
        container
            .configure_options::<Account>(config.section("Primary"))
            .unwrap()
            .add_options_configurator::<Account, _>(Lowercase)
            .unwrap()
            .add_options_validator::<Account, _>(RequirePassword)
            .unwrap();
        container.build().unwrap();

        assert_eq!(container.resolve::<Options<Account>>().unwrap().value().username, "homers");
    }

    #[test]
    fn test_validation_failure_on_resolution() {
        let config = Configuration::from_pairs([("Account:Username", Some("homers"))]).unwrap();
        let mut container = IocContainer::new();
        container
            .add_options_validator::<Account, _>(RequirePassword)
            .unwrap()
            .configure_options::<Account>(config.section("Account"))
            .unwrap();
        container.build().unwrap();

        let err = container.resolve::<Options<Account>>().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Invalid password.");
    }

    #[test]
    fn test_snapshot_per_scope() {
        let config = configuration();
        let mut container = IocContainer::new();
        container.configure_options::<Account>(config.section("Secondary")).unwrap();
        container.build().unwrap();

        let first = container.create_scope().unwrap();
        let before = container.resolve_scoped::<OptionsSnapshot<Account>>(&first).unwrap();

        config.set("Secondary:Username", Some("lisa")).unwrap();
        let again = container.resolve_scoped::<OptionsSnapshot<Account>>(&first).unwrap();
        let second = container.create_scope().unwrap();
        let after = container.resolve_scoped::<OptionsSnapshot<Account>>(&second).unwrap();

        assert!(Arc::ptr_eq(&before, &again));
        assert_eq!(before.value().username, "marge");
        assert_eq!(after.value().username, "lisa");
        assert!(after.version() > before.version());
    }
}
