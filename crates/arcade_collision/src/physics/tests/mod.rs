//! Cross-module scenarios exercising grid, SAT, projectiles and picking together
