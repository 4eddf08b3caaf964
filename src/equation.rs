use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Largest operand drawn for an equation (inclusive).
pub const MAX_OPERAND: i32 = 9;

/// The single field perturbed to turn a correct equation into a false one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Corruption {
    /// Second operand shown one higher, product kept.
    SecondOperand,
    /// Product shown one lower.
    Product,
    /// First operand shown one higher, product kept.
    FirstOperand,
}

impl Corruption {
    const ALL: [Corruption; 3] = [
        Corruption::SecondOperand,
        Corruption::Product,
        Corruption::FirstOperand,
    ];
}

/// A true/false statement shown to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equation {
    pub text: String,
    pub is_true: bool,
    pub first: i32,
    pub second: i32,
    pub product: i32,
    pub corruption: Option<Corruption>,
}

impl Equation {
    fn new(first: i32, second: i32, product: i32, corruption: Option<Corruption>) -> Self {
        Self {
            text: format!("{first} x {second} = {product}"),
            is_true: corruption.is_none(),
            first,
            second,
            product,
            corruption,
        }
    }

    pub fn correct(first: i32, second: i32) -> Self {
        Self::new(first, second, first * second, None)
    }

    /// Builds the false variant of `first x second`.
    ///
    /// Corrupting an operand next to a zero can still yield an arithmetically
    /// valid statement (`0 x 4 = 0`); it is flagged false regardless.
    pub fn corrupted(first: i32, second: i32, corruption: Corruption) -> Self {
        let product = first * second;
        match corruption {
            Corruption::SecondOperand => Self::new(first, second + 1, product, Some(corruption)),
            Corruption::Product => Self::new(first, second, product - 1, Some(corruption)),
            Corruption::FirstOperand => Self::new(first + 1, second, product, Some(corruption)),
        }
    }

    /// Whether the displayed operands multiply to the displayed product.
    pub fn is_consistent(&self) -> bool {
        self.first * self.second == self.product
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Produces the shuffled equation set for a round from an injected random source.
#[derive(Debug)]
pub struct EquationGenerator<R: Rng> {
    rng: R,
}

impl<R: Rng> EquationGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Generates exactly `question_count` equations in random order.
    ///
    /// The number of true equations is itself drawn uniformly from
    /// `0..=question_count`, so all-true and all-false rounds both occur.
    pub fn generate(&mut self, question_count: usize) -> Vec<Equation> {
        let correct_count = self.rng.gen_range(0..=question_count);

        let mut equations: Vec<Equation> = (0..correct_count)
            .map(|_| self.correct_equation())
            .collect();
        equations.extend((correct_count..question_count).map(|_| self.incorrect_equation()));

        self.shuffle(&mut equations);
        equations
    }

    fn operand(&mut self) -> i32 {
        self.rng.gen_range(0..=MAX_OPERAND)
    }

    fn correct_equation(&mut self) -> Equation {
        let (first, second) = (self.operand(), self.operand());
        Equation::correct(first, second)
    }

    fn incorrect_equation(&mut self) -> Equation {
        let (first, second) = (self.operand(), self.operand());
        let corruption = Corruption::ALL[self.rng.gen_range(0..Corruption::ALL.len())];
        Equation::corrupted(first, second, corruption)
    }

    // Fisher-Yates, walking from the last index down to 1.
    fn shuffle(&mut self, equations: &mut [Equation]) {
        for i in (1..equations.len()).rev() {
            let j = self.rng.gen_range(0..=i);
            equations.swap(i, j);
        }
    }
}

impl EquationGenerator<StdRng> {
    pub fn from_seed(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl Default for EquationGenerator<StdRng> {
    fn default() -> Self {
        Self::from_entropy()
    }
}
