/// `Name` is a String that names various types of objects (entities, nodes, ports, packages)
pub type Name = String;
