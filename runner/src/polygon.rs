use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolygonError {
    #[error("Failed to read polygon file")]
    Io(#[from] std::io::Error),
    #[error("Polygon file is empty")]
    Empty,
    #[error("Invalid vertex count '{0}'")]
    InvalidCount(String),
    #[error("Missing coordinate for vertex {0}")]
    MissingCoordinate(usize),
    #[error("Invalid coordinate '{0}'")]
    InvalidNumber(String),
}

/// Simple polygon as an ordered list of vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<(f64, f64)>,
}

/// parse a decimal or rational (`a/b`) coordinate
pub fn parse_number(input: &str) -> Result<f64, PolygonError> {
    let invalid = || PolygonError::InvalidNumber(input.to_owned());

    match input.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator = numerator.parse::<f64>().map_err(|_| invalid())?;
            let denominator = denominator.parse::<f64>().map_err(|_| invalid())?;

            Ok(numerator / denominator)
        }
        None => input.parse::<f64>().map_err(|_| invalid()),
    }
}

impl FromStr for Polygon {
    type Err = PolygonError;

    /// parse `N x1 y1 ... xN yN`, anything after the first line is ignored
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let line = input.lines().next().ok_or(PolygonError::Empty)?;
        let mut tokens = line.split_whitespace();

        let count = tokens.next().ok_or(PolygonError::Empty)?;
        let count = count
            .parse::<usize>()
            .map_err(|_| PolygonError::InvalidCount(count.to_owned()))?;

        let vertices = (0..count)
            .map(|index| {
                let x = tokens.next().ok_or(PolygonError::MissingCoordinate(index))?;
                let y = tokens.next().ok_or(PolygonError::MissingCoordinate(index))?;

                Ok((parse_number(x)?, parse_number(y)?))
            })
            .collect::<Result<Vec<_>, PolygonError>>()?;

        Ok(Self { vertices })
    }
}

pub fn read_polygon(path: &Path) -> Result<Polygon, PolygonError> {
    let mut line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut line)?;

    line.parse()
}
