//! Recipe cost graph: product → (material | sub-recipe → material).
//!
//! The graph is loaded once per operation and walked in memory. A single
//! recursive walk serves cost calculation, cascade scoping and the material
//! requirements used by checkout.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::{product, product_recipe, raw_material, sub_recipe, sub_recipe_ingredient};
use crate::errors::ServiceError;

/// Product lines sit at depth 1, sub-recipe lines at depth 2. Anything deeper is ignored.
pub const MAX_RECIPE_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ingredient {
    Material(Uuid),
    SubRecipe(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeLine {
    pub ingredient: Ingredient,
    /// Quantity per unit of the owner (product or sub-recipe).
    pub quantity: Decimal,
}

impl RecipeLine {
    pub fn material(material_id: Uuid, quantity: Decimal) -> Self {
        Self {
            ingredient: Ingredient::Material(material_id),
            quantity,
        }
    }

    pub fn sub_recipe(sub_recipe_id: Uuid, quantity: Decimal) -> Self {
        Self {
            ingredient: Ingredient::SubRecipe(sub_recipe_id),
            quantity,
        }
    }

    fn from_row(row: &product_recipe::Model) -> Option<Self> {
        match (row.material_id, row.sub_recipe_id) {
            (Some(material_id), None) => Some(Self::material(material_id, row.quantity)),
            (None, Some(sub_recipe_id)) => Some(Self::sub_recipe(sub_recipe_id, row.quantity)),
            _ => {
                warn!(
                    recipe_id = %row.id,
                    product_id = %row.product_id,
                    "Recipe row must reference exactly one of material or sub-recipe; ignoring"
                );
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecipeGraph {
    products: HashMap<Uuid, Vec<RecipeLine>>,
    sub_recipes: HashMap<Uuid, Vec<RecipeLine>>,
    material_costs: HashMap<Uuid, Decimal>,
}

impl RecipeGraph {
    /// Loads every recipe, sub-recipe and material cost of a store.
    #[instrument(skip(conn))]
    pub async fn load<C: ConnectionTrait>(conn: &C, store_id: Uuid) -> Result<Self, DbErr> {
        Self::load_scoped(conn, store_id, None).await
    }

    /// Loads the recipes of the given products only. Sub-recipes and material
    /// costs are still read store-wide.
    #[instrument(skip(conn, product_ids), fields(products = product_ids.len()))]
    pub async fn load_for_products<C: ConnectionTrait>(
        conn: &C,
        store_id: Uuid,
        product_ids: &[Uuid],
    ) -> Result<Self, DbErr> {
        Self::load_scoped(conn, store_id, Some(product_ids)).await
    }

    async fn load_scoped<C: ConnectionTrait>(
        conn: &C,
        store_id: Uuid,
        product_ids: Option<&[Uuid]>,
    ) -> Result<Self, DbErr> {
        let mut recipe_query = product_recipe::Entity::find()
            .inner_join(product::Entity)
            .filter(product::Column::StoreId.eq(store_id));
        if let Some(ids) = product_ids {
            recipe_query =
                recipe_query.filter(product_recipe::Column::ProductId.is_in(ids.iter().copied()));
        }
        let recipe_rows = recipe_query.all(conn).await?;

        let ingredient_rows = sub_recipe_ingredient::Entity::find()
            .inner_join(sub_recipe::Entity)
            .filter(sub_recipe::Column::StoreId.eq(store_id))
            .all(conn)
            .await?;

        let costs: Vec<(Uuid, Decimal)> = raw_material::Entity::find()
            .select_only()
            .column(raw_material::Column::Id)
            .column(raw_material::Column::CurrentCost)
            .filter(raw_material::Column::StoreId.eq(store_id))
            .into_tuple()
            .all(conn)
            .await?;

        let mut graph = RecipeGraph::default();
        for row in &recipe_rows {
            if let Some(line) = RecipeLine::from_row(row) {
                graph.add_product_line(row.product_id, line);
            }
        }
        for row in ingredient_rows {
            graph.add_sub_recipe_line(
                row.sub_recipe_id,
                RecipeLine::material(row.material_id, row.quantity),
            );
        }
        for (material_id, cost) in costs {
            graph.set_material_cost(material_id, cost);
        }
        Ok(graph)
    }

    pub fn add_product_line(&mut self, product_id: Uuid, line: RecipeLine) {
        self.products.entry(product_id).or_default().push(line);
    }

    pub fn add_sub_recipe_line(&mut self, sub_recipe_id: Uuid, line: RecipeLine) {
        self.sub_recipes.entry(sub_recipe_id).or_default().push(line);
    }

    pub fn set_material_cost(&mut self, material_id: Uuid, cost: Decimal) {
        self.material_costs.insert(material_id, cost);
    }

    /// Sum of `quantity × current_cost` over every material reachable from the product.
    /// Unknown materials and sub-recipes contribute zero.
    pub fn ingredient_cost(&self, product_id: Uuid) -> Result<Decimal, ServiceError> {
        let mut total = Some(Decimal::ZERO);
        self.walk_product(product_id, Decimal::ONE, &mut |material_id, quantity| {
            match self.material_costs.get(&material_id) {
                Some(cost) => {
                    total = total.zip(quantity).and_then(|(sum, q)| {
                        q.checked_mul(*cost).and_then(|c| sum.checked_add(c))
                    });
                }
                None => warn!(
                    %product_id,
                    %material_id,
                    "Recipe references an unknown material; counting it as zero cost"
                ),
            }
        });
        total.ok_or_else(|| overflow(product_id))
    }

    /// Material quantities consumed by `units` of the product, merged per material.
    /// Ordered by material id so callers lock batches in a stable order.
    pub fn material_requirements(
        &self,
        product_id: Uuid,
        units: Decimal,
    ) -> Result<Vec<(Uuid, Decimal)>, ServiceError> {
        let mut merged: BTreeMap<Uuid, Decimal> = BTreeMap::new();
        let mut overflowed = false;
        self.walk_product(product_id, units, &mut |material_id, quantity| {
            if !self.material_costs.contains_key(&material_id) {
                warn!(
                    %product_id,
                    %material_id,
                    "Recipe references an unknown material; nothing to deduct"
                );
                return;
            }
            let entry = merged.entry(material_id).or_default();
            match quantity.and_then(|q| entry.checked_add(q)) {
                Some(sum) => *entry = sum,
                None => overflowed = true,
            }
        });
        if overflowed {
            return Err(overflow(product_id));
        }
        Ok(merged
            .into_iter()
            .filter(|(_, quantity)| *quantity > Decimal::ZERO)
            .collect())
    }

    pub fn references_material(&self, product_id: Uuid, material_id: Uuid) -> bool {
        let mut found = false;
        self.walk_product(product_id, Decimal::ONE, &mut |reached, _| {
            found |= reached == material_id;
        });
        found
    }

    /// Products whose recipe reaches the material, directly or through a sub-recipe.
    pub fn products_referencing(&self, material_id: Uuid) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .products
            .keys()
            .copied()
            .filter(|product_id| self.references_material(*product_id, material_id))
            .collect();
        ids.sort();
        ids
    }

    /// Visits every reachable material with its scaled quantity, or `None`
    /// when the scaled quantity does not fit in a `Decimal`.
    fn walk_product<F>(&self, product_id: Uuid, factor: Decimal, visit: &mut F)
    where
        F: FnMut(Uuid, Option<Decimal>),
    {
        if let Some(lines) = self.products.get(&product_id) {
            self.walk(lines, Some(factor), 1, visit);
        }
    }

    fn walk<F>(&self, lines: &[RecipeLine], factor: Option<Decimal>, depth: usize, visit: &mut F)
    where
        F: FnMut(Uuid, Option<Decimal>),
    {
        for line in lines {
            let quantity = factor.and_then(|f| f.checked_mul(line.quantity));
            match line.ingredient {
                Ingredient::Material(material_id) => visit(material_id, quantity),
                Ingredient::SubRecipe(sub_recipe_id) => {
                    if depth >= MAX_RECIPE_DEPTH {
                        warn!(
                            %sub_recipe_id,
                            depth,
                            "Nested sub-recipe exceeds supported depth; ignoring"
                        );
                        continue;
                    }
                    match self.sub_recipes.get(&sub_recipe_id) {
                        Some(sub_lines) => self.walk(sub_lines, quantity, depth + 1, visit),
                        None => warn!(
                            %sub_recipe_id,
                            "Recipe references an unknown or empty sub-recipe; counting it as zero"
                        ),
                    }
                }
            }
        }
    }
}

fn overflow(product_id: Uuid) -> ServiceError {
    ServiceError::ValidationError(format!(
        "recipe quantities for product {} are too large to compute",
        product_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct Fixture {
        graph: RecipeGraph,
        latte: Uuid,
        espresso_shot: Uuid,
        milk: Uuid,
        beans: Uuid,
        syrup: Uuid,
    }

    fn fixture() -> Fixture {
        let latte = Uuid::new_v4();
        let espresso_shot = Uuid::new_v4();
        let milk = Uuid::new_v4();
        let beans = Uuid::new_v4();
        let syrup = Uuid::new_v4();

        let mut graph = RecipeGraph::default();
        graph.set_material_cost(milk, dec!(20));
        graph.set_material_cost(beans, dec!(150));
        graph.set_material_cost(syrup, dec!(40));
        graph.add_sub_recipe_line(espresso_shot, RecipeLine::material(beans, dec!(18)));
        graph.add_product_line(latte, RecipeLine::material(milk, dec!(200)));
        graph.add_product_line(latte, RecipeLine::sub_recipe(espresso_shot, dec!(2)));

        Fixture {
            graph,
            latte,
            espresso_shot,
            milk,
            beans,
            syrup,
        }
    }

    #[test]
    fn direct_material_cost() {
        let product = Uuid::new_v4();
        let material = Uuid::new_v4();
        let mut graph = RecipeGraph::default();
        graph.set_material_cost(material, dec!(1000));
        graph.add_product_line(product, RecipeLine::material(material, dec!(2)));

        assert_eq!(graph.ingredient_cost(product).unwrap(), dec!(2000));
    }

    #[test]
    fn sub_recipe_cost_is_scaled_by_line_quantity() {
        let f = fixture();
        // 200 × 20 + 2 × (18 × 150)
        assert_eq!(f.graph.ingredient_cost(f.latte).unwrap(), dec!(9400));
    }

    #[test]
    fn missing_references_contribute_zero() {
        let mut f = fixture();
        f.graph
            .add_product_line(f.latte, RecipeLine::material(Uuid::new_v4(), dec!(5)));
        f.graph
            .add_product_line(f.latte, RecipeLine::sub_recipe(Uuid::new_v4(), dec!(1)));

        assert_eq!(f.graph.ingredient_cost(f.latte).unwrap(), dec!(9400));
    }

    #[test]
    fn nesting_beyond_two_levels_is_ignored() {
        let mut f = fixture();
        let inner = Uuid::new_v4();
        f.graph.add_sub_recipe_line(inner, RecipeLine::material(f.syrup, dec!(10)));
        f.graph
            .add_sub_recipe_line(f.espresso_shot, RecipeLine::sub_recipe(inner, dec!(1)));

        assert_eq!(f.graph.ingredient_cost(f.latte).unwrap(), dec!(9400));
        assert!(!f.graph.references_material(f.latte, f.syrup));
    }

    #[test]
    fn self_referencing_sub_recipe_terminates() {
        let mut f = fixture();
        f.graph.add_sub_recipe_line(
            f.espresso_shot,
            RecipeLine::sub_recipe(f.espresso_shot, dec!(1)),
        );
        assert_eq!(f.graph.ingredient_cost(f.latte).unwrap(), dec!(9400));
    }

    #[test]
    fn requirements_merge_and_scale_by_units() {
        let mut f = fixture();
        f.graph.add_product_line(f.latte, RecipeLine::material(f.milk, dec!(50)));

        let needs = f.graph.material_requirements(f.latte, dec!(3)).unwrap();
        let as_map: HashMap<Uuid, Decimal> = needs.into_iter().collect();
        assert_eq!(as_map.get(&f.milk), Some(&dec!(750)));
        assert_eq!(as_map.get(&f.beans), Some(&dec!(108)));
        assert_eq!(as_map.len(), 2);
    }

    #[test]
    fn products_referencing_follows_sub_recipes() {
        let f = fixture();
        let cold_brew = Uuid::new_v4();
        let mut graph = f.graph.clone();
        graph.add_product_line(cold_brew, RecipeLine::material(f.syrup, dec!(1)));

        assert_eq!(graph.products_referencing(f.beans), vec![f.latte]);
        assert_eq!(graph.products_referencing(f.syrup), vec![cold_brew]);
        assert!(graph.products_referencing(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn product_without_recipe_costs_nothing() {
        let f = fixture();
        let tea = Uuid::new_v4();
        assert_eq!(f.graph.ingredient_cost(tea).unwrap(), Decimal::ZERO);
        assert!(f.graph.material_requirements(tea, dec!(1)).unwrap().is_empty());
    }

    #[test]
    fn oversized_quantities_are_rejected_instead_of_overflowing() {
        let product = Uuid::new_v4();
        let material = Uuid::new_v4();
        let sub = Uuid::new_v4();
        let mut graph = RecipeGraph::default();
        graph.set_material_cost(material, Decimal::MAX);
        graph.add_sub_recipe_line(sub, RecipeLine::material(material, Decimal::MAX));
        graph.add_product_line(product, RecipeLine::sub_recipe(sub, dec!(10)));

        assert!(matches!(
            graph.material_requirements(product, dec!(2)),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            graph.ingredient_cost(product),
            Err(ServiceError::ValidationError(_))
        ));
    }
}
