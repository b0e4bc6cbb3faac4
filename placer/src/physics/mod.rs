pub mod wirelength;
