//! Reference list of known foods and the calorie arithmetic used at logging
//! time. The catalog never writes consumption data itself.

use crate::models::Food;

/// Icon stored when a food is created without one.
pub const DEFAULT_ICON: &str = "🍽️";

/// Calories contributed by `quantity_grams` of `food`, rounded to the nearest
/// kcal. Foods with unknown calories contribute 0.
#[must_use]
pub fn calories_for(food: &Food, quantity_grams: f64) -> i64 {
    calories_from_density(food.calories_per_100g, quantity_grams)
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calories_from_density(calories_per_100g: Option<i64>, quantity_grams: f64) -> i64 {
    match calories_per_100g {
        Some(per_100g) => (per_100g as f64 * quantity_grams / 100.0).round() as i64,
        None => 0,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeedFood {
    pub name: &'static str,
    pub icon: &'static str,
    pub calories_per_100g: i64,
}

const fn seed(name: &'static str, icon: &'static str, calories_per_100g: i64) -> SeedFood {
    SeedFood {
        name,
        icon,
        calories_per_100g,
    }
}

/// Common foods loaded by `seed`. Names double as the natural key.
pub const SEED_FOODS: &[SeedFood] = &[
    seed("Pão Francês", "🥖", 300),
    seed("Arroz Branco", "🍚", 130),
    seed("Feijão Preto", "🫘", 77),
    seed("Frango Grelhado", "🍗", 165),
    seed("Carne Bovina", "🥩", 250),
    seed("Ovo Cozido", "🥚", 155),
    seed("Banana", "🍌", 89),
    seed("Maçã", "🍎", 52),
    seed("Laranja", "🍊", 47),
    seed("Leite Integral", "🥛", 61),
    seed("Queijo Minas", "🧀", 264),
    seed("Iogurte Natural", "🥛", 61),
    seed("Batata Frita", "🍟", 312),
    seed("Batata Doce", "🍠", 86),
    seed("Macarrão", "🍝", 131),
    seed("Pizza", "🍕", 266),
    seed("Hambúrguer", "🍔", 295),
    seed("Sanduíche", "🥪", 226),
    seed("Salada Verde", "🥗", 15),
    seed("Tomate", "🍅", 18),
    seed("Cenoura", "🥕", 41),
    seed("Brócolis", "🥦", 34),
    seed("Café", "☕", 2),
    seed("Suco de Laranja", "🧃", 45),
    seed("Refrigerante", "🥤", 42),
    seed("Coca-Cola Zero", "🥤", 0),
    seed("Água", "💧", 0),
    seed("Chocolate", "🍫", 546),
    seed("Sorvete", "🍦", 207),
    seed("Bolo", "🍰", 257),
    seed("Biscoito", "🍪", 502),
    seed("Peixe Grelhado", "🐟", 206),
    seed("Camarão", "🦐", 99),
    seed("Salmão", "🍣", 208),
    seed("Atum", "🐟", 144),
    seed("Abacate", "🥑", 160),
    seed("Amendoim", "🥜", 567),
    seed("Castanha", "🌰", 656),
    seed("Tapioca", "🫓", 358),
    seed("Açaí", "🫐", 70),
    seed("Coxinha", "🥟", 250),
    seed("Pastel", "🥟", 312),
    seed("Pão de Queijo", "🧀", 335),
    seed("Brigadeiro", "🍬", 400),
    seed("Feijoada", "🍲", 150),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn food(calories_per_100g: Option<i64>) -> Food {
        Food {
            id: 1,
            name: "Banana".to_string(),
            icon: "🍌".to_string(),
            calories_per_100g,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_calories_for_100g_is_exact() {
        for cal in [0, 1, 89, 546, 656] {
            assert_eq!(calories_for(&food(Some(cal)), 100.0), cal);
        }
    }

    #[test]
    fn test_calories_for_unknown_is_zero() {
        assert_eq!(calories_for(&food(None), 100.0), 0);
        assert_eq!(calories_for(&food(None), 250.0), 0);
    }

    #[test]
    fn test_calories_for_rounds() {
        // 89 * 150 / 100 = 133.5
        assert_eq!(calories_for(&food(Some(89)), 150.0), 134);
        // 52 * 30 / 100 = 15.6
        assert_eq!(calories_for(&food(Some(52)), 30.0), 16);
        // 77 * 10 / 100 = 7.7
        assert_eq!(calories_for(&food(Some(77)), 10.0), 8);
    }

    #[test]
    fn test_seed_names_are_unique() {
        let mut names: Vec<&str> = SEED_FOODS.iter().map(|f| f.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
        assert_eq!(before, 45);
    }
}
