mod interpolation;
