use crate::{
    models::NetworkName,
    recipe::{Recipe, RecipeConfig},
};

/// Several recipes run back to back as one: a single unshield, every step of every recipe in order,
/// and a single shield at the end.
#[derive(Debug)]
pub struct ComboMeal {
    pub config: RecipeConfig,
    pub recipes: Vec<Recipe>,
}

impl ComboMeal {
    pub fn new(config: RecipeConfig, recipes: Vec<Recipe>) -> Self {
        Self { config, recipes }
    }

    /// Networks every recipe in the meal supports, in the first recipe's order.
    pub fn supported_networks(&self) -> Vec<NetworkName> {
        let mut recipes = self.recipes.iter();
        let Some(first) = recipes.next() else {
            return Vec::new();
        };
        let rest: Vec<&Recipe> = recipes.collect();
        first
            .supported_networks
            .iter()
            .copied()
            .filter(|n| rest.iter().all(|r| r.supports_network(*n)))
            .collect()
    }

    pub fn into_recipe(self) -> Recipe {
        let supported_networks = self.supported_networks();
        let steps = self
            .recipes
            .into_iter()
            .flat_map(|r| r.steps)
            .collect();
        Recipe::new(self.config, supported_networks, steps)
    }
}
