use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    #[schemars(description = "Morning meal (café)")]
    Breakfast,
    #[schemars(description = "Midday meal (almoço)")]
    Lunch,
    #[schemars(description = "Afternoon snack (lanche)")]
    Snack,
    #[schemars(description = "Evening meal (jantar)")]
    Dinner,
}

impl MealType {
    pub const ALL: [MealType; 4] = [Self::Breakfast, Self::Lunch, Self::Snack, Self::Dinner];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Population {
    #[schemars(description = "Incarcerated population of the unit")]
    Internal,
    #[schemars(description = "Unit staff (funcionários)")]
    Staff,
}

/// One of the eight meal-type/population columns of a meal map.
///
/// The declaration order is the column order used by pasted tables,
/// price rows and export rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MealField {
    BreakfastInternal,
    BreakfastStaff,
    LunchInternal,
    LunchStaff,
    SnackInternal,
    SnackStaff,
    DinnerInternal,
    DinnerStaff,
}

impl MealField {
    pub const ALL: [MealField; 8] = [
        Self::BreakfastInternal,
        Self::BreakfastStaff,
        Self::LunchInternal,
        Self::LunchStaff,
        Self::SnackInternal,
        Self::SnackStaff,
        Self::DinnerInternal,
        Self::DinnerStaff,
    ];

    pub fn meal_type(self) -> MealType {
        match self {
            Self::BreakfastInternal | Self::BreakfastStaff => MealType::Breakfast,
            Self::LunchInternal | Self::LunchStaff => MealType::Lunch,
            Self::SnackInternal | Self::SnackStaff => MealType::Snack,
            Self::DinnerInternal | Self::DinnerStaff => MealType::Dinner,
        }
    }

    pub fn population(self) -> Population {
        match self {
            Self::BreakfastInternal
            | Self::LunchInternal
            | Self::SnackInternal
            | Self::DinnerInternal => Population::Internal,
            _ => Population::Staff,
        }
    }

    /// Key of the column in the persisted record store.
    pub fn store_key(self) -> &'static str {
        match self {
            Self::BreakfastInternal => "cafe_interno",
            Self::BreakfastStaff => "cafe_funcionario",
            Self::LunchInternal => "almoco_interno",
            Self::LunchStaff => "almoco_funcionario",
            Self::SnackInternal => "lanche_interno",
            Self::SnackStaff => "lanche_funcionario",
            Self::DinnerInternal => "jantar_interno",
            Self::DinnerStaff => "jantar_funcionario",
        }
    }
}

macro_rules! per_meal_series {
    (
        $(#[$meta:meta])*
        $name:ident<$elem:ty> {
            $($field:ident: $variant:ident => $key:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
        pub struct $name {
            $(
                #[serde(rename = $key, default)]
                pub $field: Vec<$elem>,
            )+
        }

        impl $name {
            pub fn get(&self, field: MealField) -> &Vec<$elem> {
                match field {
                    $(MealField::$variant => &self.$field,)+
                }
            }

            pub fn get_mut(&mut self, field: MealField) -> &mut Vec<$elem> {
                match field {
                    $(MealField::$variant => &mut self.$field,)+
                }
            }

            /// Columns in canonical [`MealField::ALL`] order.
            pub fn iter(&self) -> impl Iterator<Item = (MealField, &Vec<$elem>)> + '_ {
                MealField::ALL.into_iter().map(move |f| (f, self.get(f)))
            }

            pub fn is_empty(&self) -> bool {
                self.iter().all(|(_, values)| values.is_empty())
            }

            /// Length of the longest column.
            pub fn max_len(&self) -> usize {
                self.iter().map(|(_, values)| values.len()).max().unwrap_or(0)
            }
        }
    };
}

per_meal_series! {
    /// Daily meal counts, one column per meal-type/population pair.
    MealSeries<u32> {
        breakfast_internal: BreakfastInternal => "cafe_interno",
        breakfast_staff: BreakfastStaff => "cafe_funcionario",
        lunch_internal: LunchInternal => "almoco_interno",
        lunch_staff: LunchStaff => "almoco_funcionario",
        snack_internal: SnackInternal => "lanche_interno",
        snack_staff: SnackStaff => "lanche_funcionario",
        dinner_internal: DinnerInternal => "jantar_interno",
        dinner_staff: DinnerStaff => "jantar_funcionario",
    }
}

per_meal_series! {
    /// Daily signed differences between a meal count and the SIISP reference.
    DeviationSeries<i64> {
        breakfast_internal: BreakfastInternal => "cafe_interno_siisp",
        breakfast_staff: BreakfastStaff => "cafe_funcionario_siisp",
        lunch_internal: LunchInternal => "almoco_interno_siisp",
        lunch_staff: LunchStaff => "almoco_funcionario_siisp",
        snack_internal: SnackInternal => "lanche_interno_siisp",
        snack_staff: SnackStaff => "lanche_funcionario_siisp",
        dinner_internal: DinnerInternal => "jantar_interno_siisp",
        dinner_staff: DinnerStaff => "jantar_funcionario_siisp",
    }
}

/// Composite identity of a meal map: one unit, one lot, one month.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct RecordIdentity {
    pub lot_id: u32,
    pub unit_name: String,
    pub month: u32,
    pub year: i32,
}

impl RecordIdentity {
    pub fn new(lot_id: u32, unit_name: impl Into<String>, month: u32, year: i32) -> Self {
        Self {
            lot_id,
            unit_name: unit_name.into(),
            month,
            year,
        }
    }

    pub fn matches(&self, record: &MealRecord) -> bool {
        record.unit_name == self.unit_name
            && record.month == self.month
            && record.year == self.year
            && record.lot_id == self.lot_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MealRecord {
    #[schemars(description = "Surrogate id, stable across resubmissions of the same identity")]
    pub id: u64,

    #[serde(rename = "lote_id")]
    pub lot_id: u32,

    #[serde(rename = "nome_unidade")]
    pub unit_name: String,

    #[serde(rename = "mes")]
    pub month: u32,

    #[serde(rename = "ano")]
    pub year: i32,

    #[serde(rename = "data", default)]
    #[schemars(description = "Every day of the month as DD/MM/YYYY, starting at day 1")]
    pub dates: Vec<String>,

    #[serde(rename = "data_criacao", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,

    #[serde(
        rename = "data_atualizacao_siisp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub siisp_updated_at: Option<NaiveDateTime>,

    #[serde(flatten)]
    pub meals: MealSeries,

    #[serde(rename = "n_siisp", default)]
    #[schemars(description = "SIISP population count per day; empty when not supplied")]
    pub siisp_reference: Vec<i64>,

    #[serde(flatten)]
    pub deviations: DeviationSeries,
}

impl MealRecord {
    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity::new(self.lot_id, self.unit_name.clone(), self.month, self.year)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(MealRecord)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MealPrice {
    #[serde(rename = "interno", default)]
    pub internal: f64,
    #[serde(rename = "funcionario", default)]
    pub staff: f64,
}

impl MealPrice {
    pub fn for_population(&self, population: Population) -> f64 {
        match population {
            Population::Internal => self.internal,
            Population::Staff => self.staff,
        }
    }
}

/// Unit prices agreed in a lot's contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PriceTable {
    #[serde(rename = "cafe", default)]
    pub breakfast: MealPrice,
    #[serde(rename = "almoco", default)]
    pub lunch: MealPrice,
    #[serde(rename = "lanche", default)]
    pub snack: MealPrice,
    #[serde(rename = "jantar", default)]
    pub dinner: MealPrice,
}

impl PriceTable {
    pub fn for_meal(&self, meal_type: MealType) -> &MealPrice {
        match meal_type {
            MealType::Breakfast => &self.breakfast,
            MealType::Lunch => &self.lunch,
            MealType::Snack => &self.snack,
            MealType::Dinner => &self.dinner,
        }
    }

    pub fn price(&self, field: MealField) -> f64 {
        self.for_meal(field.meal_type())
            .for_population(field.population())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Lot {
    pub id: u32,

    #[serde(rename = "nome", default)]
    pub name: String,

    #[serde(rename = "empresa", default)]
    pub company: String,

    #[serde(rename = "unidades", default)]
    pub unit_ids: Vec<u32>,

    #[serde(rename = "precos", default)]
    pub prices: PriceTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Unit {
    pub id: u32,
    #[serde(rename = "nome")]
    pub name: String,
}
