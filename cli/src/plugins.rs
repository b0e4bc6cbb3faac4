use anyhow::{Context, bail};
use pnr_conductor::{MenuEntry, Plugin, PluginInfo, RunArgs};

/// Menus and actions offered by the host, keyed by dotted path.
#[derive(Default)]
pub struct PluginRegistry<'a> {
    menus: Vec<MenuEntry>,
    actions: Vec<Box<dyn Plugin + 'a>>,
}

impl<'a> PluginRegistry<'a> {
    pub fn new() -> Self {
        Self {
            menus: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Files the action under its menu, creating the menu on first use. An
    /// action naming a registered `before_action` is listed in front of it.
    pub fn register(&mut self, plugin: Box<dyn Plugin + 'a>) -> anyhow::Result<()> {
        let info = plugin.describe();
        if self.actions.iter().any(|a| a.describe().path == info.path) {
            bail!("An action is already registered under '{}'", info.path);
        }
        if !self.menus.contains(&info.menu) {
            self.menus.push(info.menu);
        }
        log::debug!("Registered '{}' from {}", info.path, info.module);
        let anchor = info
            .before_action
            .and_then(|before| self.actions.iter().position(|a| a.describe().path == before));
        match anchor {
            Some(index) => self.actions.insert(index, plugin),
            None => self.actions.push(plugin),
        }
        Ok(())
    }

    pub fn menus(&self) -> &[MenuEntry] {
        &self.menus
    }

    pub fn actions(&self) -> impl Iterator<Item = PluginInfo> + '_ {
        self.actions.iter().map(|a| a.describe())
    }

    pub fn run(&self, path: &str, args: RunArgs) -> anyhow::Result<i32> {
        let action = self
            .actions
            .iter()
            .find(|a| a.describe().path == path)
            .with_context(|| format!("No action registered under '{}'", path))?;
        log::info!("Running '{}'", action.describe().label);
        Ok(action.run(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counter<'c> {
        path: &'static str,
        before: Option<&'static str>,
        runs: &'c Cell<usize>,
    }

    fn counter<'c>(path: &'static str, runs: &'c Cell<usize>) -> Box<Counter<'c>> {
        Box::new(Counter {
            path,
            before: None,
            runs,
        })
    }

    impl Plugin for Counter<'_> {
        fn describe(&self) -> PluginInfo {
            PluginInfo {
                menu: MenuEntry {
                    path: "tools",
                    label: "Tools",
                },
                path: self.path,
                before_action: self.before,
                label: "Counter",
                description: "Counts its runs",
                module: module_path!(),
            }
        }

        fn run(&self, _args: RunArgs) -> i32 {
            self.runs.set(self.runs.get() + 1);
            0
        }
    }

    #[test]
    fn actions_share_their_menu_and_run_by_path() {
        let runs = Cell::new(0);
        let mut registry = PluginRegistry::new();
        registry.register(counter("tools.a", &runs)).unwrap();
        registry.register(counter("tools.b", &runs)).unwrap();

        assert_eq!(registry.menus().len(), 1);
        assert_eq!(registry.actions().count(), 2);
        assert_eq!(registry.run("tools.b", RunArgs::default()).unwrap(), 0);
        assert_eq!(runs.get(), 1);
        assert!(registry.run("tools.c", RunArgs::default()).is_err());
    }

    #[test]
    fn duplicate_paths_are_refused() {
        let runs = Cell::new(0);
        let mut registry = PluginRegistry::new();
        registry.register(counter("tools.a", &runs)).unwrap();
        assert!(registry.register(counter("tools.a", &runs)).is_err());
    }

    #[test]
    fn anchored_actions_are_listed_before_their_anchor() {
        let runs = Cell::new(0);
        let mut registry = PluginRegistry::new();
        registry.register(counter("tools.a", &runs)).unwrap();
        registry.register(counter("tools.b", &runs)).unwrap();
        registry
            .register(Box::new(Counter {
                path: "tools.c",
                before: Some("tools.b"),
                runs: &runs,
            }))
            .unwrap();
        registry
            .register(Box::new(Counter {
                path: "tools.d",
                before: Some("tools.missing"),
                runs: &runs,
            }))
            .unwrap();

        let order: Vec<_> = registry.actions().map(|a| a.path).collect();
        assert_eq!(order, vec!["tools.a", "tools.c", "tools.b", "tools.d"]);
    }
}
