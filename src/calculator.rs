//! Toy calculator library.
//!
//! These are the functions the demo mutation campaign mutates (in their
//! `demos/calculator.py` rendition). Fallible operations return
//! [`CalculatorError`] instead of panicking.
//!
//! # Example
//!
//! ```rust
//! use mutation_harness::calculator::{add, divide, modulo};
//!
//! assert_eq!(add(5, 3), Ok(8));
//! assert_eq!(divide(7.0, 2.0), Ok(3.5));
//! assert_eq!(modulo(-10, 3), Ok(2));
//! ```

use thiserror::Error;

/// Calculator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CalculatorError {
    /// Division with a zero divisor.
    #[error("Cannot divide by zero")]
    DivideByZero,
    /// Square root of a negative number.
    #[error("Cannot calculate square root of negative number")]
    NegativeSquareRoot,
    /// Modulo with a zero divisor.
    #[error("Cannot compute modulo with divisor 0")]
    ModuloByZero,
    /// Factorial of a negative number.
    #[error("Factorial not defined for negative numbers")]
    NegativeFactorial,
    /// Result does not fit the return type.
    #[error("result overflows the integer range")]
    Overflow,
}

/// `a + b`.
pub fn add(a: i64, b: i64) -> Result<i64, CalculatorError> {
    a.checked_add(b).ok_or(CalculatorError::Overflow)
}

/// `a - b`.
pub fn subtract(a: i64, b: i64) -> Result<i64, CalculatorError> {
    a.checked_sub(b).ok_or(CalculatorError::Overflow)
}

/// `a * b`.
pub fn multiply(a: i64, b: i64) -> Result<i64, CalculatorError> {
    a.checked_mul(b).ok_or(CalculatorError::Overflow)
}

/// `a / b` as a floating point quotient.
pub fn divide(a: f64, b: f64) -> Result<f64, CalculatorError> {
    if b == 0.0 {
        return Err(CalculatorError::DivideByZero);
    }
    Ok(a / b)
}

/// `a` raised to the power of `b`.
pub fn power(a: f64, b: f64) -> f64 {
    a.powf(b)
}

/// Square root of a non-negative number.
pub fn square_root(a: f64) -> Result<f64, CalculatorError> {
    if a < 0.0 {
        return Err(CalculatorError::NegativeSquareRoot);
    }
    Ok(a.sqrt())
}

/// Absolute value.
pub fn absolute(a: i64) -> Result<i64, CalculatorError> {
    a.checked_abs().ok_or(CalculatorError::Overflow)
}

/// Floored modulo: the result takes the sign of the divisor.
pub fn modulo(a: i64, b: i64) -> Result<i64, CalculatorError> {
    if b == 0 {
        return Err(CalculatorError::ModuloByZero);
    }
    // `i64::MIN % -1` overflows in the hardware op but is 0.
    let r = a.checked_rem(b).unwrap_or(0);
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

/// `n!` for non-negative `n`.
pub fn factorial(n: i64) -> Result<u64, CalculatorError> {
    if n < 0 {
        return Err(CalculatorError::NegativeFactorial);
    }
    if n == 0 || n == 1 {
        return Ok(1);
    }
    let mut result: u64 = 1;
    for i in 2..=n as u64 {
        result = result.checked_mul(i).ok_or(CalculatorError::Overflow)?;
    }
    Ok(result)
}

/// Greatest common divisor of the absolute values; `gcd(0, 0) == 0`.
pub fn gcd(a: i64, b: i64) -> u64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
